pub mod simulated_drone;
