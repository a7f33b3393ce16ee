//! General Log Command Vocabulary
//!
//! Every header line in a general query log names the server command that
//! produced it. Only `Connect`, `Query` and `Quit` drive replay. The rest of
//! the vocabulary the server documents is kept as distinct variants, and any
//! name outside it is carried verbatim in [`CommandKind::Other`] so that newer
//! server commands still split entries correctly.

use std::fmt;

/// The command recorded by a general log header line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandKind {
    BinlogDump,
    ChangeUser,
    CloseStmt,
    Connect,
    ConnectOut,
    CreateDb,
    Daemon,
    Debug,
    DelayedInsert,
    DropDb,
    Error,
    Execute,
    Fetch,
    FieldList,
    InitDb,
    Kill,
    LongData,
    Ping,
    Prepare,
    Processlist,
    Query,
    Quit,
    Refresh,
    RegisterSlave,
    ResetStmt,
    SetOption,
    Shutdown,
    Sleep,
    Statistics,
    TableDump,
    Time,
    /// A command name outside the known vocabulary, e.g. `Reset Connection`
    Other(String),
}

impl CommandKind {
    /// All known commands, in the order the server defines them.
    pub const ALL: [CommandKind; 31] = [
        CommandKind::BinlogDump,
        CommandKind::ChangeUser,
        CommandKind::CloseStmt,
        CommandKind::Connect,
        CommandKind::ConnectOut,
        CommandKind::CreateDb,
        CommandKind::Daemon,
        CommandKind::Debug,
        CommandKind::DelayedInsert,
        CommandKind::DropDb,
        CommandKind::Error,
        CommandKind::Execute,
        CommandKind::Fetch,
        CommandKind::FieldList,
        CommandKind::InitDb,
        CommandKind::Kill,
        CommandKind::LongData,
        CommandKind::Ping,
        CommandKind::Prepare,
        CommandKind::Processlist,
        CommandKind::Query,
        CommandKind::Quit,
        CommandKind::Refresh,
        CommandKind::RegisterSlave,
        CommandKind::ResetStmt,
        CommandKind::SetOption,
        CommandKind::Shutdown,
        CommandKind::Sleep,
        CommandKind::Statistics,
        CommandKind::TableDump,
        CommandKind::Time,
    ];

    /// Looks up a known command by the exact name the server writes to the
    /// log. Returns `None` for anything outside the vocabulary.
    pub fn known(name: &str) -> Option<Self> {
        let kind = match name {
            "Binlog Dump" => CommandKind::BinlogDump,
            "Change user" => CommandKind::ChangeUser,
            "Close stmt" => CommandKind::CloseStmt,
            "Connect" => CommandKind::Connect,
            "Connect Out" => CommandKind::ConnectOut,
            "Create DB" => CommandKind::CreateDb,
            "Daemon" => CommandKind::Daemon,
            "Debug" => CommandKind::Debug,
            "Delayed insert" => CommandKind::DelayedInsert,
            "Drop DB" => CommandKind::DropDb,
            "Error" => CommandKind::Error,
            "Execute" => CommandKind::Execute,
            "Fetch" => CommandKind::Fetch,
            "Field List" => CommandKind::FieldList,
            "Init DB" => CommandKind::InitDb,
            "Kill" => CommandKind::Kill,
            "Long Data" => CommandKind::LongData,
            "Ping" => CommandKind::Ping,
            "Prepare" => CommandKind::Prepare,
            "Processlist" => CommandKind::Processlist,
            "Query" => CommandKind::Query,
            "Quit" => CommandKind::Quit,
            "Refresh" => CommandKind::Refresh,
            "Register Slave" => CommandKind::RegisterSlave,
            "Reset stmt" => CommandKind::ResetStmt,
            "Set option" => CommandKind::SetOption,
            "Shutdown" => CommandKind::Shutdown,
            "Sleep" => CommandKind::Sleep,
            "Statistics" => CommandKind::Statistics,
            "Table Dump" => CommandKind::TableDump,
            "Time" => CommandKind::Time,
            _ => return None,
        };
        Some(kind)
    }

    /// Maps a header's command name, keeping unknown names as [`CommandKind::Other`].
    pub fn from_name(name: &str) -> Self {
        Self::known(name).unwrap_or_else(|| CommandKind::Other(name.to_string()))
    }

    /// The name as written in the log.
    pub fn as_str(&self) -> &str {
        match self {
            CommandKind::BinlogDump => "Binlog Dump",
            CommandKind::ChangeUser => "Change user",
            CommandKind::CloseStmt => "Close stmt",
            CommandKind::Connect => "Connect",
            CommandKind::ConnectOut => "Connect Out",
            CommandKind::CreateDb => "Create DB",
            CommandKind::Daemon => "Daemon",
            CommandKind::Debug => "Debug",
            CommandKind::DelayedInsert => "Delayed insert",
            CommandKind::DropDb => "Drop DB",
            CommandKind::Error => "Error",
            CommandKind::Execute => "Execute",
            CommandKind::Fetch => "Fetch",
            CommandKind::FieldList => "Field List",
            CommandKind::InitDb => "Init DB",
            CommandKind::Kill => "Kill",
            CommandKind::LongData => "Long Data",
            CommandKind::Ping => "Ping",
            CommandKind::Prepare => "Prepare",
            CommandKind::Processlist => "Processlist",
            CommandKind::Query => "Query",
            CommandKind::Quit => "Quit",
            CommandKind::Refresh => "Refresh",
            CommandKind::RegisterSlave => "Register Slave",
            CommandKind::ResetStmt => "Reset stmt",
            CommandKind::SetOption => "Set option",
            CommandKind::Shutdown => "Shutdown",
            CommandKind::Sleep => "Sleep",
            CommandKind::Statistics => "Statistics",
            CommandKind::TableDump => "Table Dump",
            CommandKind::Time => "Time",
            CommandKind::Other(name) => name,
        }
    }

    /// Returns true if this command ends a client session.
    #[inline]
    pub fn is_quit(&self) -> bool {
        matches!(self, CommandKind::Quit)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lookup_matches_display() {
        for kind in CommandKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
            assert_eq!(CommandKind::from_name(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(CommandKind::known("query"), None);
        assert_eq!(CommandKind::known("Quit "), None);
        assert_eq!(CommandKind::known("Reset Connection"), None);

        let kind = CommandKind::from_name("Binlog Dump GTID");
        assert_eq!(kind, CommandKind::Other("Binlog Dump GTID".to_string()));
        assert_eq!(kind.to_string(), "Binlog Dump GTID");
        assert!(!kind.is_quit());
    }

    #[test]
    fn test_is_quit() {
        assert!(CommandKind::Quit.is_quit());
        assert!(!CommandKind::Query.is_quit());
        assert!(!CommandKind::Kill.is_quit());
    }
}
