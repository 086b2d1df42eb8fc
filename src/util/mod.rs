//! Misc non-public utility code for the crate itself.

#[cfg(test)]
mod test;

#[cfg(test)]
pub(crate) use self::test::*;
