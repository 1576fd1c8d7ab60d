use crossterm::event::KeyEvent;

/// All possible messages that drive state transitions.
#[derive(Debug)]
pub enum Msg {
    // -- Input events (raw)
    Key(KeyEvent),
    Resize,

    // -- Form actions
    ValidatePath,
    PathChanged,
    SaveRepos,
    InstallNodes,
    /// Combined output of a finished clone run.
    InstallFinished(String),

    // -- System
    Tick,
    Quit,
}
