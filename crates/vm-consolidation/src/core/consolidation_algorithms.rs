pub mod bee_colony;
pub mod first_fit;
pub mod genetic;
pub mod particle_swarm;
pub mod population;
