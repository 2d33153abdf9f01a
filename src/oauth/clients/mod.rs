//! OAuth client registration and the client registration file.

pub mod registration;

pub use registration::{
    ClientRegistrationRequest, ClientRegistrationService, load_clients_file, save_clients_file,
};
