//! Domain entities for the Dexcom-OSC bridge.
//!
//! Everything in here is plain data plus the rules that govern it.  None of
//! these types know how they are fetched, stored or transmitted; those
//! concerns live in the bridge crate's infrastructure layer.

pub mod credentials;
pub mod endpoint;
pub mod reading;
