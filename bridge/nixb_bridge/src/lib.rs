//! Safe, lifetime-managed handles over the Nix C API.
//!
//! The bridge is generic over a [`nixb_sys::NixApi`] call table: the real
//! libraries (feature `native` of `nixb_sys`) or the in-process reference
//! engine. Everything starts from a [`Session`]:
//!
//! ```text
//! let session = Session::new(api)?;
//! let store = session.open_store("")?;
//! let state = store.state().search_path("nixpkgs=/src/nixpkgs").build()?;
//! let value = state.eval("{ a = 1; b = \"x\"; }")?;
//! let a = value.lookup("a")?;            // Some(forced handle)
//! let host = value.get_deep()?;           // Host::Attrs { a: Int(1), b: String("x") }
//! ```
//!
//! # Errors
//!
//! Every fallible native call is dispatched through the session's context
//! pool and checked before the bridge returns; a failing code becomes an
//! [`Error`] carrying the native message. See [`ErrorKind`] for the
//! classification.
//!
//! # Ownership
//!
//! Each native handle has exactly one Rust owner and is released exactly
//! once, on `Drop` or through an explicit consuming call
//! ([`Store::unref`], [`State::free`], [`StorePath::free`]). Values keep
//! their state alive, states and store paths keep their store alive, and
//! everything keeps the session alive, so release order is always
//! value, then state, then store.
//!
//! Nothing here is `Send`: a session and everything derived from it live on
//! one thread.

mod bindings;
mod context;
mod error;
mod handle;
mod session;
mod state;
mod store;
mod value;

pub use bindings::BindingsBuilder;
pub use error::{Error, ErrorKind, Result};
pub use session::Session;
pub use state::{State, StateBuilder};
pub use store::{Store, StorePath, URI_BUFFER_LEN, VERSION_BUFFER_LEN};
pub use value::{External, Function, Host, Key, Keys, Value, ValueKind};
