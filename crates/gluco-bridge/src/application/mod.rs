//! Application layer use cases for the bridge.
//!
//! # What lives here?
//!
//! - **`ports`** – The traits the polling engine drives (`ShareSource`,
//!   `EndpointResolver`, `MessageSink`) and the tagged result types they
//!   return.  Infrastructure adapters implement them; tests substitute
//!   recording fakes.
//!
//! - **`backoff`** – Exponential retry delay policy for transient upstream
//!   failures.
//!
//! - **`poll_engine`** – The fetch → classify → deliver control loop and the
//!   per-run [`poll_engine::BridgeSession`] state it owns.
//!
//! **Dependency rule**: this layer depends only on `gluco_core` and its own
//! traits.  It MUST NOT import anything from `infrastructure`.

pub mod backoff;
pub mod poll_engine;
pub mod ports;
