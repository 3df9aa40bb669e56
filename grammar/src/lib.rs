//! Grammar intermediate representation and LL(1) analysis for the descent
//! parser generator.
//!
//! Every grammar dialect the generator understands decodes to [cfg::Grammar];
//! [ll1::analyze] derives the nullable set, FIRST / FOLLOW sets and the
//! per-rule SELECT sets from it and records the LL(1) conflicts.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

pub mod cfg;
pub mod compute;
pub mod ll1;

#[cfg(test)]
mod test {
    /// analyzer properties on expression grammars
    mod expr;
    /// list shapes, the nullable fixpoint and conflict reporting
    mod lists;
}
