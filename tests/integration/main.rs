//! End-to-end flows through the public service API.

mod fixtures;
mod placement;
mod settlement;
mod sqlite_flow;
