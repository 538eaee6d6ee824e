//! Line-oriented command loop driving the room client.

use classpulse_ai::{advise_or_fallback, ClassroomSummary, GeminiClient, GeminiConfig};
use classpulse_config::ClasspulseConfig;
use classpulse_room::{wall, RoomClient, RoomState, RoomUpdate};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

use crate::cli::Args;

pub async fn run(
    client: RoomClient,
    mut updates: mpsc::Receiver<RoomUpdate>,
    config: &ClasspulseConfig,
    args: &Args,
) -> classpulse_common::Result<()> {
    let identity = client.identity().await;
    println!(
        "joined room '{}' as {} ({})",
        args.room.trim(),
        identity.display_name,
        if identity.is_teacher() { "teacher" } else { "student" },
    );
    println!("type 'help' for commands");

    let advice = (!config.advice.api_key.is_empty()).then(|| {
        GeminiClient::new(
            GeminiConfig::new(config.advice.api_key.clone())
                .with_model(config.advice.model.clone())
                .with_max_tokens(config.advice.max_tokens),
        )
    });

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { break };
                if !print_update(&client, update).await {
                    break;
                }
            }
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if !handle_command(&client, advice.as_ref(), line).await {
                    break;
                }
            }
        }
    }

    client.shutdown().await;
    info!("left the room");
    Ok(())
}

/// Returns false when the loop should exit.
async fn print_update(client: &RoomClient, update: RoomUpdate) -> bool {
    match update {
        RoomUpdate::RelayConnected => println!("* relay connected"),
        RoomUpdate::RelayWaiting => println!("* waiting for relay..."),
        RoomUpdate::RoomJoined { topic } => println!("* subscribed to {topic}"),
        RoomUpdate::RosterChanged {
            student_count,
            teacher_present,
        } => {
            println!(
                "* roster: {student_count} student(s), teacher {}",
                if teacher_present { "present" } else { "absent" }
            );
        }
        RoomUpdate::BuzzerChanged(buzzer) => match (&buzzer.winner_id, buzzer.active) {
            (Some(winner), _) => {
                let state = client.state().await;
                let name = state
                    .students
                    .get(winner)
                    .map(|s| s.name.as_str())
                    .unwrap_or("unknown");
                println!("* buzzer winner: {name} ({winner})");
            }
            (None, true) => println!("* buzzer open"),
            (None, false) => println!("* buzzer locked"),
        },
        RoomUpdate::MessagePosted(message) => {
            let state = client.state().await;
            let me = client.identity().await;
            if wall::is_message_visible(&message, &me.session_id, me.role, &state.wall_config) {
                let name = if wall::shows_author_name(&message, &me.session_id, &state.wall_config)
                {
                    message.sender_name.clone()
                } else {
                    "a classmate".to_string()
                };
                let attachment = if message.image_url.is_some() {
                    " [image]"
                } else {
                    ""
                };
                println!("[wall] {name}: {}{attachment}", message.text.as_deref().unwrap_or(""));
            }
        }
        RoomUpdate::WallChanged(config) => {
            println!(
                "* wall: {}, names {}, {}",
                if config.is_public { "public" } else { "private" },
                if config.show_names { "shown" } else { "hidden" },
                if config.is_locked { "locked" } else { "open" },
            );
        }
        RoomUpdate::RemovedFromRoom => {
            println!("* you were removed from the room");
            return false;
        }
        RoomUpdate::RelayIssue(message) => println!("* relay issue: {message}"),
    }
    true
}

/// Returns false when the loop should exit.
async fn handle_command(client: &RoomClient, advice: Option<&GeminiClient>, line: &str) -> bool {
    let identity = client.identity().await;
    let (command, rest) = match line.split_once(' ') {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    let outcome: Result<(), classpulse_common::ClasspulseError> = match command {
        "help" => {
            print_help(identity.is_teacher());
            Ok(())
        }
        "status" => {
            println!(
                "relay {}",
                if client.is_relay_connected() {
                    "connected"
                } else {
                    "waiting"
                }
            );
            print_status(&client.state().await);
            Ok(())
        }
        "wall" => {
            print_wall(client).await;
            Ok(())
        }
        "quit" | "exit" => return false,

        // student actions
        "hand" => {
            client.set_hand_raised(rest != "off").await;
            Ok(())
        }
        "done" => {
            client.set_finished(rest != "off").await;
            Ok(())
        }
        "sos" => {
            client.set_needs_help(rest != "off").await;
            Ok(())
        }
        "buzz" => client.press_buzzer().await,
        "post" => client.post_message(Some(rest), None).await.map(|_| ()),
        "attach" => match tokio::fs::read(rest).await {
            Ok(bytes) => client
                .post_message(None, Some(bytes.as_slice()))
                .await
                .map(|_| ()),
            Err(e) => Err(e.into()),
        },

        // teacher moderation
        "reset-buzzer" => client.reset_buzzer().await,
        "lock-buzzer" => client.lock_buzzer().await,
        "reset-all" => client.reset_all().await,
        "remove" => client.remove_student(rest).await,
        "wall-public" => client
            .update_wall(|c| c.is_public = rest != "off")
            .await
            .map(|_| ()),
        "wall-names" => client
            .update_wall(|c| c.show_names = rest != "off")
            .await
            .map(|_| ()),
        "wall-lock" => client
            .update_wall(|c| c.is_locked = rest != "off")
            .await
            .map(|_| ()),
        "allow" => {
            let id = rest.to_string();
            client
                .update_wall(|c| {
                    if !c.allowed_student_ids.contains(&id) {
                        c.allowed_student_ids.push(id);
                    }
                })
                .await
                .map(|_| ())
        }
        "ask" => {
            match advice {
                Some(advice_client) => {
                    let summary = ClassroomSummary::from(&client.state().await);
                    let reply = advise_or_fallback(advice_client, rest, &summary).await;
                    println!("[assistant] {reply}");
                }
                None => println!("[assistant] not configured (set advice.api_key)"),
            }
            Ok(())
        }

        other => {
            println!("unknown command '{other}', try 'help'");
            Ok(())
        }
    };

    if let Err(e) = outcome {
        println!("! {e}");
    }
    true
}

fn print_help(teacher: bool) {
    println!("common:  status | wall | quit");
    if teacher {
        println!("teacher: reset-buzzer | lock-buzzer | reset-all | remove <id>");
        println!("         wall-public [off] | wall-names [off] | wall-lock [off] | allow <id>");
        println!("         post <text> | attach <jpeg-path> | ask <question>");
    } else {
        println!("student: hand [off] | done [off] | sos [off] | buzz");
        println!("         post <text> | attach <jpeg-path>");
    }
}

fn print_status(state: &RoomState) {
    println!(
        "teacher {}; buzzer {}{}",
        if state.teacher_present { "present" } else { "absent" },
        if state.buzzer.active { "open" } else { "locked" },
        state
            .buzzer
            .winner_id
            .as_deref()
            .map(|w| format!(", winner {w}"))
            .unwrap_or_default(),
    );
    for student in state.roster() {
        let mut flags = Vec::new();
        if student.hand_raised {
            flags.push("hand");
        }
        if student.needs_help {
            flags.push("sos");
        }
        if student.is_finished {
            flags.push("done");
        }
        println!(
            "  {} [{}] {} {}",
            student.name,
            student.group.as_deref().unwrap_or("-"),
            student.id,
            if flags.is_empty() {
                String::new()
            } else {
                format!("({})", flags.join(","))
            },
        );
    }
}

async fn print_wall(client: &RoomClient) {
    let state = client.state().await;
    let me = client.identity().await;
    let visible = wall::visible_messages(&state, &me.session_id, me.role);
    if visible.is_empty() {
        println!("(the wall is empty)");
        return;
    }
    for message in visible {
        let name = if wall::shows_author_name(message, &me.session_id, &state.wall_config) {
            message.sender_name.clone()
        } else {
            "a classmate".to_string()
        };
        let attachment = if message.image_url.is_some() {
            " [image]"
        } else {
            ""
        };
        println!("{name}: {}{attachment}", message.text.as_deref().unwrap_or(""));
    }
}
