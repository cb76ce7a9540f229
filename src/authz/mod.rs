mod server;

pub use server::AuthzServer;
