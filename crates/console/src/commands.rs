//! Line commands typed at the console prompt.

use retriage_core::{Condition, CoreError, DbId};
use retriage_sync::RemovalMode;

pub const HELP: &str = "\
commands:
  show                              print the active event
  events                            list every event on the backend
  refresh                           reload the active event over REST
  move <patient> <from> <to>        move a patient between pools
  add <card> <condition> [bay]      create a patient, optionally in a bay
  discharge <patient> <pool>        discharge a patient
  delete <patient> <pool>           delete a patient
  condition <patient> <pool> <c>    change a patient's condition
  toggle                            start, pause or resume the event
  drag <patient> | over <pool> | drop [pool] | cancel
                                    step through a drag gesture
  dismiss                           hide the current error
  help | quit";

/// A mutation or gesture step applied to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Move {
        patient_id: DbId,
        from: DbId,
        to: DbId,
    },
    Add {
        card_id: i64,
        condition: Condition,
        pool_id: Option<DbId>,
    },
    Remove {
        patient_id: DbId,
        pool_id: DbId,
        mode: RemovalMode,
    },
    UpdateCondition {
        patient_id: DbId,
        pool_id: DbId,
        condition: Condition,
    },
    Toggle,
    DragStart(DbId),
    DragOver(DbId),
    Drop(Option<DbId>),
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Intent(Intent),
    Show,
    Events,
    Refresh,
    Dismiss,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&head, args)) = words.split_first() else {
        return Ok(None);
    };

    let command = match (head.to_ascii_lowercase().as_str(), args) {
        ("show" | "ls", []) => Command::Show,
        ("events", []) => Command::Events,
        ("refresh", []) => Command::Refresh,
        ("dismiss", []) => Command::Dismiss,
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        ("toggle", []) => Command::Intent(Intent::Toggle),
        ("cancel", []) => Command::Intent(Intent::Cancel),

        ("move", [patient, from, to]) => Command::Intent(Intent::Move {
            patient_id: id(patient)?,
            from: id(from)?,
            to: id(to)?,
        }),
        ("move", _) => return Err(CommandError::Usage("move <patient> <from> <to>")),

        ("add", [card, condition, rest @ ..]) if rest.len() <= 1 => Command::Intent(Intent::Add {
            card_id: id(card)?,
            condition: condition.parse()?,
            pool_id: rest.first().map(|p| id(p)).transpose()?,
        }),
        ("add", _) => return Err(CommandError::Usage("add <card> <condition> [bay]")),

        (verb @ ("discharge" | "delete"), [patient, pool]) => Command::Intent(Intent::Remove {
            patient_id: id(patient)?,
            pool_id: id(pool)?,
            mode: if verb == "discharge" {
                RemovalMode::Discharge
            } else {
                RemovalMode::Delete
            },
        }),
        ("discharge", _) => return Err(CommandError::Usage("discharge <patient> <pool>")),
        ("delete", _) => return Err(CommandError::Usage("delete <patient> <pool>")),

        ("condition", [patient, pool, condition]) => {
            Command::Intent(Intent::UpdateCondition {
                patient_id: id(patient)?,
                pool_id: id(pool)?,
                condition: condition.parse()?,
            })
        }
        ("condition", _) => {
            return Err(CommandError::Usage("condition <patient> <pool> <condition>"))
        }

        ("drag", [patient]) => Command::Intent(Intent::DragStart(id(patient)?)),
        ("drag", _) => return Err(CommandError::Usage("drag <patient>")),
        ("over", [pool]) => Command::Intent(Intent::DragOver(id(pool)?)),
        ("over", _) => return Err(CommandError::Usage("over <pool>")),
        ("drop", []) => Command::Intent(Intent::Drop(None)),
        ("drop", [pool]) => Command::Intent(Intent::Drop(Some(id(pool)?))),
        ("drop", _) => return Err(CommandError::Usage("drop [pool]")),

        _ => return Err(CommandError::Unknown(line.trim().to_string())),
    };
    Ok(Some(command))
}

fn id(raw: &str) -> Result<DbId, CommandError> {
    raw.trim_start_matches('#')
        .parse()
        .map_err(|_| CommandError::NotANumber(raw.to_string()))
}
