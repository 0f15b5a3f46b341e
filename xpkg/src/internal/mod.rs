#![forbid(unsafe_code)]

pub(crate) mod macros;
#[cfg(feature = "validate")]
pub(crate) mod regex;
pub(crate) mod std_ext;
#[cfg(feature = "validate")]
pub(crate) mod validators;

#[cfg(test)]
pub(crate) mod test_utils;
