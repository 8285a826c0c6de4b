pub mod auth_commands;
pub mod playback_commands;
pub mod queue_commands;

use crate::error::{AppError, AppResult};
use crate::AppState;
use serde_json::{json, Value};

pub const HELP: &str = "\
commands:
  login                        print the authorize URL
  callback <code>              finish login with the redirect code
  logout | status
  play <track_id>
  context <album|playlist|artist|track> <id>
  collection <id> <track_id>...
  device <device_id>           report the SDK device as ready
  toggle | next | prev | shuffle | repeat
  volume <0..1> | seek <ms>
  queue | enqueue <track_id>
  state | clear";

/// Runs one text command and returns its JSON result.
pub async fn dispatch(state: &AppState, line: &str) -> AppResult<Value> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(Value::Null);
    };
    let args: Vec<&str> = words.collect();
    let arg = |i: usize| -> AppResult<&str> {
        args.get(i)
            .copied()
            .ok_or_else(|| AppError::InvalidCommand(format!("{} needs more arguments", command)))
    };

    let result = match command {
        "help" => json!(HELP),
        "login" => json!(auth_commands::login_url(state).await),
        "callback" => json!(auth_commands::handle_auth_callback(state, arg(0)?).await?),
        "logout" => {
            auth_commands::logout(state).await;
            Value::Null
        }
        "status" => json!(auth_commands::check_auth_status(state).await),
        "play" => {
            playback_commands::play_track(state, arg(0)?).await?;
            Value::Null
        }
        "context" => {
            playback_commands::play_context(state, arg(0)?, arg(1)?).await?;
            Value::Null
        }
        "collection" => {
            let ids: Vec<String> = args.iter().skip(1).map(|s| s.to_string()).collect();
            playback_commands::play_collection(state, arg(0)?, &ids).await?;
            Value::Null
        }
        "device" => {
            playback_commands::device_ready(state, arg(0)?).await?;
            Value::Null
        }
        "toggle" => {
            playback_commands::play_pause(state).await?;
            Value::Null
        }
        "next" => {
            playback_commands::next_track(state).await?;
            Value::Null
        }
        "prev" => {
            playback_commands::previous_track(state).await?;
            Value::Null
        }
        "shuffle" => json!(playback_commands::toggle_shuffle(state).await?),
        "repeat" => json!(playback_commands::toggle_repeat(state).await),
        "volume" => {
            let volume: f32 = arg(0)?
                .parse()
                .ok()
                .filter(|v: &f32| v.is_finite())
                .ok_or_else(|| AppError::InvalidCommand("volume must be a number".into()))?;
            playback_commands::set_volume(state, volume).await;
            Value::Null
        }
        "seek" => {
            let position: u64 = arg(0)?
                .parse()
                .map_err(|_| AppError::InvalidCommand("seek needs milliseconds".into()))?;
            playback_commands::seek(state, position).await?;
            Value::Null
        }
        "queue" => json!(queue_commands::get_queue(state).await),
        "enqueue" => {
            queue_commands::add_to_queue(state, arg(0)?).await?;
            Value::Null
        }
        "state" => json!(playback_commands::get_playback_state(state).await),
        "clear" => {
            playback_commands::clear_error(state).await;
            Value::Null
        }
        other => return Err(AppError::InvalidCommand(other.to_string())),
    };
    Ok(result)
}
