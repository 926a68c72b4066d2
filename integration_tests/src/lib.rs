pub mod sim_bus;
