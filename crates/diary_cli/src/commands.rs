//! Console line parsing.
//!
//! Each input line is either a slash command or free text. Commands map to
//! assistant events, except for the console-only `/as`, `/help` and `/quit`.

use diary_core::{EventKind, ExternalId, Mood, TaskId};

pub const HELP: &str = "\
/start                       greet and pick a class
/class <name>                choose class
/tasks                       list active tasks
/done <id>                   complete a task
/del <id>                    delete a task (admin)
/edit-subject <id> <text>    edit subject (admin)
/edit-desc <id> <text>       edit description (admin)
/edit-deadline <id> <hours>  move deadline (admin)
/add                         guided task creation (admin)
/cancel                      cancel guided creation
/quick <text>                one-line task, e.g. `Math: ex. 5 tomorrow` (admin)
/stats, /achievements        progress
/mood <happy|neutral|stressed> <1-10>, /moods
/materials <id>, /steps <id> AI helpers for a task
/pick <payload>              select a listed choice, e.g. `done:3`
/as <external id>            switch participant
/help, /quit
anything else                ask the assistant";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Event(EventKind),
    SwitchSender(ExternalId),
    Help,
    Quit,
    /// Malformed command with a usage hint.
    Usage(&'static str),
    Empty,
}

pub fn parse_line(input: &str) -> Line {
    let input = input.trim();
    if input.is_empty() {
        return Line::Empty;
    }
    let Some(command) = input.strip_prefix('/') else {
        return Line::Event(EventKind::Text(input.to_string()));
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));

    match name {
        "start" => Line::Event(EventKind::Start),
        "class" if !rest.is_empty() => Line::Event(EventKind::ChooseClass(rest.to_string())),
        "class" => Line::Usage("/class <name>"),
        "tasks" => Line::Event(EventKind::ListTasks),
        "done" => with_id(rest, "/done <id>", EventKind::CompleteTask),
        "del" => with_id(rest, "/del <id>", EventKind::DeleteTask),
        "materials" => with_id(rest, "/materials <id>", EventKind::Materials),
        "steps" => with_id(rest, "/steps <id>", EventKind::Steps),
        "edit-subject" => with_id_and_text(rest, "/edit-subject <id> <text>", |task_id, subject| {
            EventKind::EditSubject { task_id, subject }
        }),
        "edit-desc" => with_id_and_text(rest, "/edit-desc <id> <text>", |task_id, description| {
            EventKind::EditDescription {
                task_id,
                description,
            }
        }),
        "edit-deadline" => with_id_and_text(rest, "/edit-deadline <id> <hours>", |task_id, hours| {
            EventKind::EditDeadline { task_id, hours }
        }),
        "add" => Line::Event(EventKind::BeginIntake),
        "cancel" => Line::Event(EventKind::CancelIntake),
        "quick" if !rest.is_empty() => Line::Event(EventKind::QuickAdd(rest.to_string())),
        "quick" => Line::Usage("/quick <text>"),
        "stats" => Line::Event(EventKind::Stats),
        "achievements" => Line::Event(EventKind::Achievements),
        "moods" => Line::Event(EventKind::RecentMoods),
        "mood" => parse_mood(rest),
        "pick" => EventKind::from_payload(rest)
            .map(Line::Event)
            .unwrap_or(Line::Usage("/pick <payload>")),
        "as" => rest
            .parse()
            .map(Line::SwitchSender)
            .unwrap_or(Line::Usage("/as <external id>")),
        "help" => Line::Help,
        "quit" | "exit" => Line::Quit,
        _ => Line::Help,
    }
}

fn with_id(rest: &str, usage: &'static str, make: fn(TaskId) -> EventKind) -> Line {
    rest.parse()
        .map(|id| Line::Event(make(id)))
        .unwrap_or(Line::Usage(usage))
}

fn with_id_and_text(
    rest: &str,
    usage: &'static str,
    make: impl FnOnce(TaskId, String) -> EventKind,
) -> Line {
    let Some((id, text)) = rest.split_once(char::is_whitespace) else {
        return Line::Usage(usage);
    };
    match id.parse() {
        Ok(task_id) if !text.trim().is_empty() => Line::Event(make(task_id, text.trim().to_string())),
        _ => Line::Usage(usage),
    }
}

fn parse_mood(rest: &str) -> Line {
    const USAGE: &str = "/mood <happy|neutral|stressed> <1-10>";
    let mut parts = rest.split_whitespace();
    let mood = parts.next().and_then(Mood::parse);
    let load = parts.next().and_then(|raw| raw.parse::<u8>().ok());
    match (mood, load) {
        (Some(mood), Some(load_level)) => Line::Event(EventKind::LogMood { mood, load_level }),
        _ => Line::Usage(USAGE),
    }
}
