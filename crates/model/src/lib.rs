//! Contains models that are shared between the auctionhouse api and the
//! background job runner.

pub mod auction;
pub mod event;
pub mod money;
pub mod offer;
pub mod role;
