// sgen — stencil glue generator
//
// Library root. Core generation (direction algebra, pack specs, pack-info and
// sweep synthesis, parameter marshalling) plus the .sgen script front end and
// the build registry that drives them.

pub mod ast;
pub mod context;
pub mod diag;
pub mod direction;
pub mod emit;
pub mod error;
pub mod field;
pub mod kernel;
pub mod lexer;
pub mod loop_kernel;
pub mod marshal;
pub mod pack_spec;
pub mod packinfo;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod resolve;
pub mod sweep;
