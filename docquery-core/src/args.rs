//! Positional argument classification.
//!
//! Several builder calls accept an optional leading path followed by one or
//! more values. [`Args::split`] decides, from arity and the type of the first
//! value, whether that leading value is a path.

use bson::Bson;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Args<'a> {
    /// Values only, the path comes from the active path.
    Bare(&'a [Bson]),
    /// A leading path followed by the values.
    WithPath(&'a str, &'a [Bson]),
}

impl<'a> Args<'a> {
    /// Treats a leading string as the path when more than `bare` values were
    /// supplied.
    pub(crate) fn split(args: &'a [Bson], bare: usize) -> Self {
        match args.split_first() {
            Some((Bson::String(path), rest)) if args.len() > bare => Args::WithPath(path, rest),
            _ => Args::Bare(args),
        }
    }

    pub(crate) fn path(&self) -> Option<&'a str> {
        match self {
            Args::Bare(_) => None,
            Args::WithPath(path, _) => Some(path),
        }
    }

    pub(crate) fn values(&self) -> &'a [Bson] {
        match self {
            Args::Bare(values) | Args::WithPath(_, values) => values,
        }
    }
}
