pub mod register_api;
