/// `Vec::extend_no_dup` and `uniq`
mod no_dup;

pub(crate) use no_dup::*;
