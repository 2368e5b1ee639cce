//! Command catalogue: one typed method per protocol verb.
//!
//! The table at the bottom of this file is the single source for the
//! [`Verb`] enum, its wire names and the `MpdClient` methods. Name-based
//! dispatch (`call`) goes through the same table and refuses anything not in
//! it before touching the connection.
//!
//! Left out on purpose: `noidle` and `close` (they only make sense mid-idle
//! or while tearing down, and the client handles both itself), `kill`, and
//! the binary-payload verbs `albumart` and `readpicture`.

use std::fmt;

use super::MpdClient;
use crate::protocol::{MpdError, ParsedValue, Result};
use crate::transport::Connector;

/// A value that renders into zero or more command arguments.
pub trait CommandArg {
    fn push_to(self, args: &mut Vec<String>);
}

impl CommandArg for &str {
    fn push_to(self, args: &mut Vec<String>) {
        args.push(self.to_string());
    }
}

impl CommandArg for String {
    fn push_to(self, args: &mut Vec<String>) {
        args.push(self);
    }
}

impl CommandArg for u32 {
    fn push_to(self, args: &mut Vec<String>) {
        args.push(self.to_string());
    }
}

impl CommandArg for i32 {
    fn push_to(self, args: &mut Vec<String>) {
        args.push(self.to_string());
    }
}

impl CommandArg for f32 {
    fn push_to(self, args: &mut Vec<String>) {
        args.push(self.to_string());
    }
}

/// Protocol booleans are `1` / `0`
impl CommandArg for bool {
    fn push_to(self, args: &mut Vec<String>) {
        args.push(if self { "1" } else { "0" }.to_string());
    }
}

/// `None` contributes nothing; only trailing arguments are optional
impl<T: CommandArg> CommandArg for Option<T> {
    fn push_to(self, args: &mut Vec<String>) {
        if let Some(value) = self {
            value.push_to(args);
        }
    }
}

impl CommandArg for &[&str] {
    fn push_to(self, args: &mut Vec<String>) {
        args.extend(self.iter().map(|arg| arg.to_string()));
    }
}

impl CommandArg for Vec<String> {
    fn push_to(mut self, args: &mut Vec<String>) {
        args.append(&mut self);
    }
}

/// Commands queued for one `command_list_ok_begin` block.
#[derive(Debug, Clone, Default)]
pub struct CommandList {
    commands: Vec<(Verb, Vec<String>)>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<I, S>(mut self, verb: Verb, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands
            .push((verb, args.into_iter().map(Into::into).collect()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Verb, &[String])> + '_ {
        self.commands
            .iter()
            .map(|(verb, args)| (*verb, args.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<C: Connector> MpdClient<C> {
    /// Run a catalogued verb.
    ///
    /// `idle` waits up to the configured idle timeout; everything else uses
    /// the response timeout.
    pub async fn execute<S: AsRef<str>>(&self, verb: Verb, args: &[S]) -> Result<ParsedValue> {
        match verb {
            Verb::Idle => {
                self.run_with_deadline(verb.name(), args, self.settings.idle_timeout)
                    .await
            }
            _ => self.run(verb.name(), args, None).await,
        }
    }

    /// Run a verb by wire name. Unknown names fail with
    /// [`MpdError::Unsupported`] and nothing is sent.
    pub async fn call<S: AsRef<str>>(&self, name: &str, args: &[S]) -> Result<ParsedValue> {
        let verb = Verb::from_name(name).ok_or_else(|| MpdError::Unsupported(name.to_string()))?;
        self.execute(verb, args).await
    }
}

macro_rules! verbs {
    ($(
        $(#[$meta:meta])*
        $variant:ident = $name:literal => fn $method:ident($($arg:ident: $ty:ty),*);
    )*) => {
        /// Every verb the client knows how to send.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Verb {
            $($variant,)*
        }

        impl Verb {
            pub const ALL: &'static [Verb] = &[$(Verb::$variant,)*];

            /// Wire name
            pub fn name(self) -> &'static str {
                match self {
                    $(Verb::$variant => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Option<Verb> {
                match name {
                    $($name => Some(Verb::$variant),)*
                    _ => None,
                }
            }
        }

        impl<C: Connector> MpdClient<C> {
            $(
                $(#[$meta])*
                pub async fn $method(&self, $($arg: $ty),*) -> Result<ParsedValue> {
                    #[allow(unused_mut)]
                    let mut args: Vec<String> = Vec::new();
                    $($arg.push_to(&mut args);)*
                    self.execute(Verb::$variant, &args).await
                }
            )*
        }
    };
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

verbs! {
    // Status
    ClearError = "clearerror" => fn clear_error();
    CurrentSong = "currentsong" => fn current_song();
    /// One raw `idle` round trip. See [`MpdClient::idle`] for the draining session.
    Idle = "idle" => fn idle_once(subsystems: &[&str]);
    Status = "status" => fn status();
    Stats = "stats" => fn stats();

    // Playback options
    Consume = "consume" => fn consume(state: &str);
    Crossfade = "crossfade" => fn crossfade(seconds: u32);
    MixRampDb = "mixrampdb" => fn mixramp_db(decibels: f32);
    MixRampDelay = "mixrampdelay" => fn mixramp_delay(seconds: f32);
    Random = "random" => fn random(state: bool);
    Repeat = "repeat" => fn repeat(state: bool);
    /// Absolute volume, 0-100
    SetVol = "setvol" => fn set_vol(volume: u32);
    GetVol = "getvol" => fn get_vol();
    /// `0`, `1` or `oneshot`
    Single = "single" => fn single(state: &str);
    ReplayGainMode = "replay_gain_mode" => fn replay_gain_mode(mode: &str);
    ReplayGainStatus = "replay_gain_status" => fn replay_gain_status();
    /// Relative volume change
    Volume = "volume" => fn volume(change: i32);

    // Playback control
    Next = "next" => fn next();
    /// `None` toggles
    Pause = "pause" => fn pause(state: Option<bool>);
    Play = "play" => fn play(position: Option<u32>);
    PlayId = "playid" => fn play_id(id: Option<u32>);
    Previous = "previous" => fn previous();
    Seek = "seek" => fn seek(position: u32, seconds: f32);
    SeekId = "seekid" => fn seek_id(id: u32, seconds: f32);
    /// Absolute seconds, or relative with a leading `+`/`-`
    SeekCur = "seekcur" => fn seek_cur(time: &str);
    Stop = "stop" => fn stop();

    // Queue
    Add = "add" => fn add(uri: &str);
    AddId = "addid" => fn add_id(uri: &str, position: Option<&str>);
    Clear = "clear" => fn clear();
    Delete = "delete" => fn delete(range: &str);
    DeleteId = "deleteid" => fn delete_id(id: u32);
    Move = "move" => fn move_range(range: &str, to: &str);
    MoveId = "moveid" => fn move_id(id: u32, to: &str);
    Playlist = "playlist" => fn playlist();
    PlaylistFind = "playlistfind" => fn playlist_find(filter: &[&str]);
    PlaylistId = "playlistid" => fn playlist_id(id: Option<u32>);
    PlaylistInfo = "playlistinfo" => fn playlist_info(range: Option<&str>);
    PlaylistSearch = "playlistsearch" => fn playlist_search(filter: &[&str]);
    PlChanges = "plchanges" => fn pl_changes(version: u32);
    PlChangesPosId = "plchangesposid" => fn pl_changes_pos_id(version: u32);
    Prio = "prio" => fn prio(priority: u32, range: &str);
    PrioId = "prioid" => fn prio_id(priority: u32, id: u32);
    RangeId = "rangeid" => fn range_id(id: u32, range: &str);
    Shuffle = "shuffle" => fn shuffle(range: Option<&str>);
    Swap = "swap" => fn swap(first: u32, second: u32);
    SwapId = "swapid" => fn swap_id(first: u32, second: u32);
    AddTagId = "addtagid" => fn add_tag_id(id: u32, tag: &str, value: &str);
    ClearTagId = "cleartagid" => fn clear_tag_id(id: u32, tag: Option<&str>);

    // Stored playlists
    ListPlaylist = "listplaylist" => fn list_playlist(name: &str);
    ListPlaylistInfo = "listplaylistinfo" => fn list_playlist_info(name: &str);
    ListPlaylists = "listplaylists" => fn list_playlists();
    Load = "load" => fn load(name: &str, range: Option<&str>);
    PlaylistAdd = "playlistadd" => fn playlist_add(name: &str, uri: &str);
    PlaylistClear = "playlistclear" => fn playlist_clear(name: &str);
    PlaylistDelete = "playlistdelete" => fn playlist_delete(name: &str, position: &str);
    PlaylistMove = "playlistmove" => fn playlist_move(name: &str, from: u32, to: u32);
    Rename = "rename" => fn rename(name: &str, new_name: &str);
    Rm = "rm" => fn rm(name: &str);
    Save = "save" => fn save(name: &str);

    // Music database
    Count = "count" => fn count(filter: &[&str]);
    GetFingerprint = "getfingerprint" => fn get_fingerprint(uri: &str);
    Find = "find" => fn find(filter: &[&str]);
    FindAdd = "findadd" => fn find_add(filter: &[&str]);
    List = "list" => fn list(tag: &str, filter: &[&str]);
    ListAll = "listall" => fn list_all(uri: Option<&str>);
    ListAllInfo = "listallinfo" => fn list_all_info(uri: Option<&str>);
    ListFiles = "listfiles" => fn list_files(uri: Option<&str>);
    LsInfo = "lsinfo" => fn ls_info(uri: Option<&str>);
    ReadComments = "readcomments" => fn read_comments(uri: &str);
    Search = "search" => fn search(filter: &[&str]);
    SearchAdd = "searchadd" => fn search_add(filter: &[&str]);
    SearchAddPl = "searchaddpl" => fn search_add_pl(name: &str, filter: &[&str]);
    Update = "update" => fn update(uri: Option<&str>);
    Rescan = "rescan" => fn rescan(uri: Option<&str>);

    // Mounts and neighbors
    Mount = "mount" => fn mount(path: &str, uri: &str);
    Unmount = "unmount" => fn unmount(path: &str);
    ListMounts = "listmounts" => fn list_mounts();
    ListNeighbors = "listneighbors" => fn list_neighbors();

    /// `get`, `set`, `delete`, `list` or `find` followed by its operands
    Sticker = "sticker" => fn sticker(operands: &[&str]);

    // Connection
    Password = "password" => fn password(password: &str);
    Ping = "ping" => fn ping();
    BinaryLimit = "binarylimit" => fn binary_limit(size: u32);
    /// No arguments lists them; `disable`/`enable`/`clear`/`all` adjust the set
    TagTypes = "tagtypes" => fn tag_types(operands: &[&str]);

    // Partitions
    Partition = "partition" => fn partition(name: &str);
    ListPartitions = "listpartitions" => fn list_partitions();
    NewPartition = "newpartition" => fn new_partition(name: &str);
    DelPartition = "delpartition" => fn del_partition(name: &str);
    MoveOutput = "moveoutput" => fn move_output(name: &str);

    // Audio outputs
    DisableOutput = "disableoutput" => fn disable_output(id: u32);
    EnableOutput = "enableoutput" => fn enable_output(id: u32);
    ToggleOutput = "toggleoutput" => fn toggle_output(id: u32);
    Outputs = "outputs" => fn outputs();
    OutputSet = "outputset" => fn output_set(id: u32, name: &str, value: &str);

    // Reflection
    Config = "config" => fn config();
    Commands = "commands" => fn commands();
    NotCommands = "notcommands" => fn not_commands();
    UrlHandlers = "urlhandlers" => fn url_handlers();
    Decoders = "decoders" => fn decoders();

    // Client to client
    Subscribe = "subscribe" => fn subscribe(channel: &str);
    Unsubscribe = "unsubscribe" => fn unsubscribe(channel: &str);
    Channels = "channels" => fn channels();
    ReadMessages = "readmessages" => fn read_messages();
    SendMessage = "sendmessage" => fn send_message(channel: &str, text: &str);
}
