//! Route composition for Peridot.
//!
//! Applications declare routes as a tree: [`Gateway`]s bind a path and a
//! set of methods to a handler, and [`Include`]s group nested routes under
//! a common prefix, sharing permissions and middleware. [`RouteTable`]
//! flattens that tree once at startup and matches requests against it.
//!
//! # Example
//!
//! ```rust
//! use http::Method;
//! use peridot_core::{responses, Handler};
//! use peridot_router::{Gateway, Include, RouteMatch, RouteTable};
//!
//! let users = Handler::new(|_| async { responses::text("users") });
//! let table = RouteTable::from_routes(vec![Include::new(
//!     "/api",
//!     vec![Gateway::get("/users/{id}", users).into()],
//! )
//! .into()])
//! .unwrap();
//!
//! match table.match_route(&Method::GET, "/api/users/7") {
//!     RouteMatch::Found { params, .. } => assert_eq!(params.get("id"), Some("7")),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

mod error;
mod pattern;
mod route;
mod table;

pub use error::RouteError;
pub use pattern::{join_paths, PathPattern, Segment};
pub use route::{Gateway, Include, Route};
pub use table::{RouteEntry, RouteMatch, RouteTable};
