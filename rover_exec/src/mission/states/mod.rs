//! Concrete mission actions.

mod drive_time;
mod idle;
mod stop;
mod turn_corner;
mod wait_sensor_data;
mod wall_follow;
mod warmup;

pub use drive_time::DriveTime;
pub use idle::Idle;
pub use stop::Stop;
pub use turn_corner::{TurnCorner, TurnParams};
pub use wait_sensor_data::WaitSensorData;
pub use wall_follow::{WallFollow, WallFollowCfg, WallFollowParams};
pub use warmup::Warmup;
