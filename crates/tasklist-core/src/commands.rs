use anyhow::{Context, anyhow};
use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::{DataStore, Storage};
use crate::datetime::parse_deadline_expr;
use crate::render::Renderer;
use crate::stats::{FilterCounts, Stats};
use crate::store::{Action, TaskList, UiState};
use crate::task::Priority;
use crate::view::{FilterMode, SortMode};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "done", "toggle", "delete", "edit", "move", "info", "stats", "export",
        "show", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch<S: Storage>(
    store: &DataStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now().trunc_subsecs(3);
    let command = inv.command.as_str();
    let args = inv.command_args.as_slice();

    debug!(command, ?args, "dispatching command");

    match command {
        "add" => cmd_add(store, cfg, args, now),
        "list" => cmd_list(store, cfg, renderer, args, now),
        "done" | "toggle" => cmd_toggle(store, args, now),
        "delete" => cmd_delete(store, args, now),
        "edit" => cmd_edit(store, args, now),
        "move" => cmd_move(store, args, now),
        "info" => cmd_info(store, renderer, args, now),
        "stats" => cmd_stats(store, cfg, renderer, now),
        "export" => cmd_export(store, cfg, args),
        "show" => cmd_show(cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// Loads the list, applies actions, and mirrors it back if anything changed.
fn apply_and_save<S: Storage>(
    store: &DataStore<S>,
    actions: impl IntoIterator<Item = Action>,
    now: DateTime<Utc>,
) -> anyhow::Result<(TaskList, bool)> {
    let mut list = TaskList::new(store.load());
    let mut changed = false;
    for action in actions {
        changed |= list.apply(action, now).tasks_changed;
    }
    if changed {
        store.save(list.tasks())?;
    }
    Ok((list, changed))
}

#[instrument(skip(store, cfg, args, now))]
fn cmd_add<S: Storage>(
    store: &DataStore<S>,
    cfg: &Config,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let (text, mods) = parse_text_and_mods(args, now)?;
    let priority = match mods.priority {
        Some(priority) => priority,
        None => cfg.default_priority()?,
    };

    let (list, changed) = apply_and_save(
        store,
        [Action::Add {
            text,
            deadline: mods.deadline.flatten(),
            priority,
        }],
        now,
    )?;

    match list.tasks().last() {
        Some(task) if changed => println!("Created task {}.", task.id),
        _ => println!("Nothing added."),
    }
    Ok(())
}

#[instrument(skip(store, cfg, renderer, args, now))]
fn cmd_list<S: Storage>(
    store: &DataStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");

    let list = TaskList::new(store.load()).with_ui(parse_view_args(cfg, args)?);
    let stats = Stats::collect(list.tasks(), now, cfg.close_window()?);

    renderer.print_filter_bar(&FilterCounts::from_stats(&stats), list.ui().filter)?;
    println!();
    renderer.print_task_table(&list.view(), now)?;
    if stats.total > 0 {
        println!();
        renderer.print_stats(&stats)?;
    }
    Ok(())
}

#[instrument(skip(store, args, now))]
fn cmd_toggle<S: Storage>(
    store: &DataStore<S>,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command toggle");

    let ids = parse_ids(args)?;
    let (list, _) = apply_and_save(store, ids.iter().copied().map(Action::Toggle), now)?;

    for id in ids {
        match list.get(id) {
            Some(task) if task.completed => println!("Completed task {id}."),
            Some(_) => println!("Reopened task {id}."),
            None => println!("No task with id {id}."),
        }
    }
    Ok(())
}

#[instrument(skip(store, args, now))]
fn cmd_delete<S: Storage>(
    store: &DataStore<S>,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command delete");

    let ids = parse_ids(args)?;
    let before = TaskList::new(store.load());
    let existing: Vec<u64> = ids.iter().copied().filter(|id| before.get(*id).is_some()).collect();
    apply_and_save(store, ids.iter().copied().map(Action::Delete), now)?;

    for id in ids {
        if existing.contains(&id) {
            println!("Deleted task {id}.");
        } else {
            println!("No task with id {id}.");
        }
    }
    Ok(())
}

#[instrument(skip(store, args, now))]
fn cmd_edit<S: Storage>(
    store: &DataStore<S>,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command edit");

    let (id_arg, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("edit requires a task id"))?;
    let id = parse_id(id_arg)?;
    let (text, mods) = parse_edit_args(rest, now)?;

    let mut list = TaskList::new(store.load());
    list.apply(Action::StartEdit(id), now);
    let Some(buffer) = list.editing().cloned() else {
        println!("No task with id {id}.");
        return Ok(());
    };

    let save = Action::SaveEdit {
        id,
        text: text.unwrap_or(buffer.text),
        deadline: mods.deadline.unwrap_or(buffer.deadline),
        priority: mods.priority.unwrap_or(buffer.priority),
    };
    if list.apply(save, now).tasks_changed {
        store.save(list.tasks())?;
        println!("Modified task {id}.");
    } else {
        println!("Task {id} unchanged.");
    }
    Ok(())
}

/// Positions are 1-based and are applied to the canonical order.
#[instrument(skip(store, args, now))]
fn cmd_move<S: Storage>(
    store: &DataStore<S>,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command move");

    let [from, to] = args else {
        return Err(anyhow!("move requires FROM and TO positions"));
    };
    let source = parse_position(from)?;
    let destination = parse_position(to)?;

    let (_, changed) = apply_and_save(
        store,
        [Action::Reorder {
            source,
            destination: Some(destination),
        }],
        now,
    )?;

    if changed {
        println!("Moved task from position {from} to {to}.");
    } else {
        println!("Nothing moved.");
    }
    Ok(())
}

#[instrument(skip(store, renderer, args, now))]
fn cmd_info<S: Storage>(
    store: &DataStore<S>,
    renderer: &Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command info");

    let ids = parse_ids(args)?;
    let list = TaskList::new(store.load());

    for id in ids {
        let task = list
            .get(id)
            .ok_or_else(|| anyhow!("no task with id {id}"))?;
        renderer.print_task_info(task, now)?;
        println!();
    }
    Ok(())
}

#[instrument(skip(store, cfg, renderer, now))]
fn cmd_stats<S: Storage>(
    store: &DataStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command stats");

    let tasks = store.load();
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    renderer.print_stats(&Stats::collect(&tasks, now, cfg.close_window()?))
}

#[instrument(skip(store, cfg, args))]
fn cmd_export<S: Storage>(store: &DataStore<S>, cfg: &Config, args: &[String]) -> anyhow::Result<()> {
    info!("command export");

    let list = TaskList::new(store.load()).with_ui(parse_view_args(cfg, args)?);
    let rows: Vec<_> = list.view().into_iter().map(|row| row.task).collect();

    let out = serde_json::to_string(&rows)?;
    println!("{out}");
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<_> = cfg.iter().collect();
    entries.sort();
    for (key, value) in entries {
        println!("{key}={value}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Commands: add TEXT [pri:P] [due:D], list [filter:F] [sort:S] [TERMS], done/toggle ID, \
         delete ID, edit ID [TEXT] [pri:P] [due:D], move FROM TO, info ID, stats, export, show, \
         version"
    );
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Mods {
    priority: Option<Priority>,
    /// Outer `None`: not given. `Some(None)`: cleared with an empty `due:`.
    deadline: Option<Option<DateTime<Utc>>>,
}

fn parse_text_and_mods(args: &[String], now: DateTime<Utc>) -> anyhow::Result<(String, Mods)> {
    let mut text_parts = Vec::new();
    let mut mods = Mods::default();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && parse_one_mod(arg, &mut mods, now)? {
            continue;
        }

        text_parts.push(arg.as_str());
    }

    Ok((text_parts.join(" "), mods))
}

fn parse_edit_args(args: &[String], now: DateTime<Utc>) -> anyhow::Result<(Option<String>, Mods)> {
    let (text, mods) = parse_text_and_mods(args, now)?;
    let text = if text.is_empty() { None } else { Some(text) };
    Ok((text, mods))
}

fn parse_one_mod(tok: &str, mods: &mut Mods, now: DateTime<Utc>) -> anyhow::Result<bool> {
    let Some((key, value)) = tok.split_once(':') else {
        return Ok(false);
    };

    match key.to_ascii_lowercase().as_str() {
        "pri" | "priority" => {
            mods.priority = Some(value.parse()?);
            Ok(true)
        }
        "due" | "deadline" => {
            mods.deadline = if value.trim().is_empty() {
                Some(None)
            } else {
                Some(Some(parse_deadline_expr(value, now)?))
            };
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn parse_view_args(cfg: &Config, args: &[String]) -> anyhow::Result<UiState> {
    let mut ui = UiState {
        filter: cfg.default_filter()?,
        sort: cfg.default_sort()?,
        ..UiState::default()
    };
    let mut terms = Vec::new();

    for arg in args {
        match arg.split_once(':') {
            Some(("filter", value)) => ui.filter = value.parse::<FilterMode>()?,
            Some(("sort", value)) => ui.sort = value.parse::<SortMode>()?,
            Some(("search", value)) => terms.push(value),
            _ => terms.push(arg.as_str()),
        }
    }

    ui.search = terms.join(" ");
    Ok(ui)
}

fn parse_id(raw: &str) -> anyhow::Result<u64> {
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("invalid task id: {raw}"))
}

fn parse_ids(args: &[String]) -> anyhow::Result<Vec<u64>> {
    if args.is_empty() {
        return Err(anyhow!("at least one task id is required"));
    }
    args.iter().map(|arg| parse_id(arg)).collect()
}

fn parse_position(raw: &str) -> anyhow::Result<usize> {
    let position = raw
        .trim()
        .parse::<usize>()
        .with_context(|| format!("invalid position: {raw}"))?;
    position
        .checked_sub(1)
        .ok_or_else(|| anyhow!("positions start at 1, got {raw}"))
}
