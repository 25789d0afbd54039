//! The shared session directory: the in-memory registry of users and the
//! files they publish.
//!
//! A single [`std::sync::RwLock`] guards the whole registry. Every mutating
//! operation takes the write side; every pure query takes the read side.
//! Directory sizes in this application stay in the hundreds of thousands at
//! most, operations are linear scans over a small working set, and
//! correctness (in particular the atomicity of the connected-peer snapshot)
//! is worth far more than the throughput a finer-grained scheme would buy.
use std::sync::RwLock;

/// Upper bound on a user name, in bytes.
pub const MAX_NAME_LEN: usize = 255;
/// Upper bound on a file path or description, in bytes.
pub const MAX_FIELD_LEN: usize = 255;
/// Upper bound on the number of triples a single `GET_MULTIFILE` reply carries.
pub const MAX_MULTIFILE_MATCHES: usize = 255;

const MIN_PORT: u16 = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub path: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub connected: bool,
    pub ip: String,
    pub port: u16,
    pub files: Vec<File>,
}

impl User {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connected: false,
            ip: String::new(),
            port: 0,
            files: Vec::new(),
        }
    }
}

/// One row of the materialized connected-peer view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedPeer {
    pub name: String,
    pub ip: String,
    pub port: u16,
}

/// A single `(ip, port, path)` hit returned by [`Directory::get_multifile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultifileHit {
    pub ip: String,
    pub port: u16,
    pub path: String,
}

macro_rules! status_enum {
    ($name:ident { $($variant:ident = $code:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $code),+
        }

        impl $name {
            pub const fn code(self) -> u8 {
                self as u8
            }
        }
    };
}

status_enum!(RegisterStatus { Ok = 0, NameExists = 1, Other = 2 });
status_enum!(UnregisterStatus { Ok = 0, NotFound = 1, Other = 2 });
status_enum!(ConnectStatus { Ok = 0, NotFound = 1, AlreadyConnected = 2, Other = 3 });
status_enum!(DisconnectStatus { Ok = 0, NotFound = 1, NotConnected = 2, Other = 3 });
status_enum!(PublishStatus {
    Ok = 0,
    UserNotFound = 1,
    UserNotConnected = 2,
    PathAlreadyPublished = 3,
    Other = 4,
});
status_enum!(DeleteStatus {
    Ok = 0,
    UserNotFound = 1,
    UserNotConnected = 2,
    FileNotFound = 3,
    Other = 4,
});
status_enum!(ListConnectedStatus {
    Ok = 0,
    RequesterNotRegistered = 1,
    RequesterNotConnected = 2,
    Other = 3,
});
status_enum!(ListFilesStatus {
    Ok = 0,
    TargetNotFound = 1,
    RequesterNotConnected = 2,
    RequesterNotFound = 3,
    Other = 4,
});

/// Final component of `path` after the last `/` or `\`, per §9.
pub fn basename(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}

#[derive(Debug, Default)]
struct Registry {
    users: Vec<User>,
}

impl Registry {
    fn find(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.name == name)
    }

    fn connected_snapshot(&self) -> Vec<ConnectedPeer> {
        self.users
            .iter()
            .filter(|u| u.connected)
            .map(|u| ConnectedPeer {
                name: u.name.clone(),
                ip: u.ip.clone(),
                port: u.port,
            })
            .collect()
    }
}

/// The shared, lock-protected session directory.
#[derive(Debug, Default)]
pub struct Directory {
    inner: RwLock<Registry>,
}

impl Directory {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Registry::default()),
        }
    }

    pub fn register(&self, name: &str) -> RegisterStatus {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return RegisterStatus::Other;
        }
        let mut reg = self.inner.write().unwrap();
        if reg.find(name).is_some() {
            return RegisterStatus::NameExists;
        }
        reg.users.push(User::new(name));
        RegisterStatus::Ok
    }

    pub fn unregister(&self, name: &str) -> UnregisterStatus {
        let mut reg = self.inner.write().unwrap();
        let before = reg.users.len();
        reg.users.retain(|u| u.name != name);
        if reg.users.len() == before {
            UnregisterStatus::NotFound
        } else {
            UnregisterStatus::Ok
        }
    }

    pub fn connect(&self, name: &str, ip: &str, port: u16) -> ConnectStatus {
        if ip.is_empty() || port < MIN_PORT {
            return ConnectStatus::Other;
        }
        let mut reg = self.inner.write().unwrap();
        let Some(user) = reg.find_mut(name) else {
            return ConnectStatus::NotFound;
        };
        if user.connected {
            return ConnectStatus::AlreadyConnected;
        }
        user.connected = true;
        user.ip = ip.to_string();
        user.port = port;
        ConnectStatus::Ok
    }

    pub fn disconnect(&self, name: &str) -> DisconnectStatus {
        let mut reg = self.inner.write().unwrap();
        let Some(user) = reg.find_mut(name) else {
            return DisconnectStatus::NotFound;
        };
        if !user.connected {
            return DisconnectStatus::NotConnected;
        }
        user.connected = false;
        user.ip.clear();
        user.port = 0;
        DisconnectStatus::Ok
    }

    pub fn publish(&self, name: &str, path: &str, description: &str) -> PublishStatus {
        if path.is_empty() || path.len() > MAX_FIELD_LEN || description.len() > MAX_FIELD_LEN {
            return PublishStatus::Other;
        }
        let mut reg = self.inner.write().unwrap();
        let Some(user) = reg.find_mut(name) else {
            return PublishStatus::UserNotFound;
        };
        if !user.connected {
            return PublishStatus::UserNotConnected;
        }
        if user.files.iter().any(|f| f.path == path) {
            return PublishStatus::PathAlreadyPublished;
        }
        user.files.push(File {
            path: path.to_string(),
            description: description.to_string(),
        });
        PublishStatus::Ok
    }

    pub fn delete(&self, name: &str, path: &str) -> DeleteStatus {
        let mut reg = self.inner.write().unwrap();
        let Some(user) = reg.find_mut(name) else {
            return DeleteStatus::UserNotFound;
        };
        if !user.connected {
            return DeleteStatus::UserNotConnected;
        }
        let before = user.files.len();
        user.files.retain(|f| f.path != path);
        if user.files.len() == before {
            DeleteStatus::FileNotFound
        } else {
            DeleteStatus::Ok
        }
    }

    pub fn list_connected(&self, requester: &str) -> (ListConnectedStatus, Vec<ConnectedPeer>) {
        let reg = self.inner.read().unwrap();
        let Some(user) = reg.find(requester) else {
            return (ListConnectedStatus::RequesterNotRegistered, Vec::new());
        };
        if !user.connected {
            return (ListConnectedStatus::RequesterNotConnected, Vec::new());
        }
        (ListConnectedStatus::Ok, reg.connected_snapshot())
    }

    pub fn list_files(&self, requester: &str, target: &str) -> (ListFilesStatus, Vec<String>) {
        let reg = self.inner.read().unwrap();
        let Some(requester_user) = reg.find(requester) else {
            return (ListFilesStatus::RequesterNotFound, Vec::new());
        };
        if !requester_user.connected {
            return (ListFilesStatus::RequesterNotConnected, Vec::new());
        }
        let Some(target_user) = reg.find(target) else {
            return (ListFilesStatus::TargetNotFound, Vec::new());
        };
        let paths = target_user.files.iter().map(|f| f.path.clone()).collect();
        (ListFilesStatus::Ok, paths)
    }

    /// For each connected user, for each of their files whose basename matches the
    /// basename of `path`, yields a `(ip, port, path)` triple. The initial
    /// requester check reuses [`ListConnectedStatus`] per §4.1.
    pub fn get_multifile(
        &self,
        requester: &str,
        path: &str,
    ) -> (ListConnectedStatus, Vec<MultifileHit>) {
        let reg = self.inner.read().unwrap();
        let Some(user) = reg.find(requester) else {
            return (ListConnectedStatus::RequesterNotRegistered, Vec::new());
        };
        if !user.connected {
            return (ListConnectedStatus::RequesterNotConnected, Vec::new());
        }

        let wanted = basename(path);
        let mut hits = Vec::new();
        'users: for u in reg.users.iter().filter(|u| u.connected) {
            for f in &u.files {
                if basename(&f.path) == wanted {
                    hits.push(MultifileHit {
                        ip: u.ip.clone(),
                        port: u.port,
                        path: f.path.clone(),
                    });
                    if hits.len() >= MAX_MULTIFILE_MATCHES {
                        break 'users;
                    }
                }
            }
        }
        (ListConnectedStatus::Ok, hits)
    }

    /// Releases all users and files, leaving the directory empty. Called only at shutdown.
    pub fn destroy(&self) {
        let mut reg = self.inner.write().unwrap();
        reg.users.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test]
    fn register_then_duplicate_register_fails() {
        let dir = Directory::new();
        assert_eq!(dir.register("alice").code(), 0);
        assert_eq!(dir.register("alice").code(), 1);
    }

    #[test]
    fn unregister_unknown_user_is_idempotent_failure() {
        let dir = Directory::new();
        assert_eq!(dir.unregister("ghost").code(), 1);
        assert_eq!(dir.unregister("ghost").code(), 1);
    }

    #[test]
    fn unregister_removes_files() {
        let dir = Directory::new();
        dir.register("alice");
        dir.connect("alice", "10.0.0.1", 6000);
        dir.publish("alice", "/a.txt", "a file");
        assert_eq!(dir.unregister("alice").code(), 0);
        let (status, _) = dir.list_files("alice", "alice");
        assert_eq!(status.code(), ListFilesStatus::RequesterNotFound.code());
    }

    #[test_case(0 ; "zero")]
    #[test_case(1 ; "far below range")]
    #[test_case(1023 ; "just below range")]
    #[test]
    fn connect_rejects_out_of_range_port(port: u16) {
        let dir = Directory::new();
        dir.register("alice");
        let status = dir.connect("alice", "10.0.0.1", port);
        assert_eq!(status.code(), ConnectStatus::Other.code());
    }

    #[test]
    fn connect_then_connect_again_is_already_connected() {
        let dir = Directory::new();
        dir.register("alice");
        assert_eq!(dir.connect("alice", "10.0.0.1", 6000).code(), 0);
        assert_eq!(dir.connect("alice", "10.0.0.1", 6001).code(), 2);
    }

    #[test]
    fn disconnect_clears_ip_and_port() {
        let dir = Directory::new();
        dir.register("alice");
        dir.connect("alice", "10.0.0.1", 6000);
        assert_eq!(dir.disconnect("alice").code(), 0);
        let (_, peers) = dir.list_connected("alice");
        assert!(peers.is_empty());
    }

    #[test]
    fn publish_requires_connection() {
        let dir = Directory::new();
        dir.register("carol");
        assert_eq!(
            dir.publish("carol", "/x", "y").code(),
            PublishStatus::UserNotConnected.code()
        );
    }

    #[test]
    fn publish_rejects_duplicate_path_for_same_user() {
        let dir = Directory::new();
        dir.register("alice");
        dir.connect("alice", "10.0.0.1", 6000);
        assert_eq!(dir.publish("alice", "/a.txt", "d1").code(), 0);
        assert_eq!(
            dir.publish("alice", "/a.txt", "d2").code(),
            PublishStatus::PathAlreadyPublished.code()
        );
    }

    #[test]
    fn publish_then_delete_round_trips() {
        let dir = Directory::new();
        dir.register("alice");
        dir.connect("alice", "10.0.0.1", 6000);
        assert_eq!(dir.publish("alice", "/a.txt", "d").code(), 0);
        assert_eq!(dir.delete("alice", "/a.txt").code(), 0);
        let (status, paths) = dir.list_files("alice", "alice");
        assert_eq!(status.code(), 0);
        assert!(paths.is_empty());
    }

    #[test]
    fn delete_missing_file_reports_file_not_found() {
        let dir = Directory::new();
        dir.register("dave");
        dir.connect("dave", "10.0.0.1", 6000);
        assert_eq!(
            dir.delete("dave", "/nope").code(),
            DeleteStatus::FileNotFound.code()
        );
    }

    #[test]
    fn list_content_of_unknown_target_fails() {
        let dir = Directory::new();
        dir.register("eve");
        dir.connect("eve", "10.0.0.1", 6001);
        let (status, _) = dir.list_files("eve", "ghost");
        assert_eq!(status.code(), ListFilesStatus::TargetNotFound.code());
    }

    #[test]
    fn list_connected_counts_match_connected_users() {
        let dir = Directory::new();
        dir.register("alice");
        dir.connect("alice", "10.0.0.1", 5000);
        dir.register("bob");
        dir.connect("bob", "10.0.0.2", 5001);
        dir.register("carol"); // left disconnected

        let (status, peers) = dir.list_connected("bob");
        assert_eq!(status.code(), 0);
        assert_eq!(peers.len(), 2);
        assert!(peers.iter().any(|p| p.name == "alice"));
        assert!(peers.iter().any(|p| p.name == "bob"));
    }

    #[test_case("song.mp3", "song.mp3" ; "bare names match")]
    #[test_case("/home/a/song.mp3", "song.mp3" ; "posix path matches bare basename")]
    #[test_case("C:\\music\\song.mp3", "song.mp3" ; "windows path matches bare basename")]
    #[test]
    fn basename_matches_across_separators(published: &str, queried: &str) {
        assert_eq!(basename(published), basename(queried));
    }

    #[test]
    fn get_multifile_finds_every_matching_connected_file_and_no_others() {
        let dir = Directory::new();
        dir.register("alice");
        dir.connect("alice", "10.0.0.1", 5000);
        dir.publish("alice", "/music/song.mp3", "a copy");
        dir.publish("alice", "/docs/notes.txt", "not a match");

        dir.register("bob");
        dir.connect("bob", "10.0.0.2", 5001);
        dir.publish("bob", "/other/song.mp3", "another copy");

        // carol has a matching file but is not connected, so it must not appear.
        dir.register("carol");
        dir.connect("carol", "10.0.0.3", 5002);
        dir.publish("carol", "/c/song.mp3", "offline copy");
        dir.disconnect("carol");

        dir.register("dan");
        dir.connect("dan", "10.0.0.4", 5003);

        let (status, hits) = dir.get_multifile("dan", "song.mp3");
        assert_eq!(status.code(), 0);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().any(|h| h.ip == "10.0.0.1" && h.path == "/music/song.mp3"));
        assert!(hits.iter().any(|h| h.ip == "10.0.0.2" && h.path == "/other/song.mp3"));
    }

    #[test]
    fn destroy_empties_the_directory() {
        let dir = Directory::new();
        dir.register("alice");
        dir.connect("alice", "10.0.0.1", 5000);
        dir.destroy();
        assert_eq!(
            dir.unregister("alice").code(),
            UnregisterStatus::NotFound.code()
        );
    }
}
