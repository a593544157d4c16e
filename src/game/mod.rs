pub mod assets;
pub mod constants;
pub mod game_loop;
pub mod mask;
pub mod match_result;
pub mod progression;
pub mod state;
pub mod systems;
