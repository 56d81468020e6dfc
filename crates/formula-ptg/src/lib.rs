//! BIFF8 parsed-formula tokens.
//!
//! A stored formula is an `rgce` byte stream of tokens ("ptgs") in reverse-Polish order,
//! optionally followed by an `rgcb` block carrying array constants and memory-area lists.
//! This crate models every supported token as one closed [`Ptg`] enum, converts between
//! the binary and token forms without losing reserved bytes, and renders tokens back to
//! formula text.

mod array;
mod codec;
mod error;
pub mod ftab;
mod opcode;
mod ptg;
mod reader;
mod refs;
mod render;
mod strings;

pub use array::{ArrayConstant, ArrayElement};
pub use codec::{decode_rgce, decode_rgce_with_rgcb, encode_rgce, EncodedRgce};
pub use error::{DecodeRgceError, EncodeRgceError, RenderError};
pub use opcode::{PtgClass, PtgId};
pub use ptg::{Arity, Attr, BinaryOp, MemKind, MemPtg, Ptg, SpaceKind, TokenRole, UnaryOp};
pub use refs::{shift_relative, RelAreaAddr, RelCellAddr};
pub use render::{render_formula, NoContext, RenderContext, SheetLabel};
pub use strings::PtgString;
