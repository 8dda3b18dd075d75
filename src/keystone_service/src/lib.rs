mod keystone;

pub use keystone::{InMemoryKeystone, Keystone, PostgresKeystone, bootstrap};
