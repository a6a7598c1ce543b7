pub mod iso_server;
