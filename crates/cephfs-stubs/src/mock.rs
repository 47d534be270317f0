//! In-memory mock of a CephFS cluster.
//!
//! Every [`MockMount`] created from one [`MockCluster`] sees the same
//! namespace, so independent sessions observe each other's changes the way
//! two clients of a real cluster would. Faults can be queued per operation
//! with [`MockCluster::fail_next`] / [`MockCluster::fail_nth`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ffi::CStr;
use std::sync::Arc;

use cephfs_types::path;
use cephfs_types::{native_code_t, RawStatVfs, XattrFlags, ENOATTR};
use parking_lot::Mutex;

use crate::mount_stub::{MountConnector, MountStub};

/// Native operations that can carry an injected fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Create,
    ConfReadFile,
    ConfSet,
    Mount,
    SyncFs,
    Chdir,
    Mkdir,
    Rmdir,
    Rename,
    Opendir,
    Readdir,
    Closedir,
    Statfs,
    Getxattr,
    Listxattr,
    Setxattr,
    Removexattr,
}

#[derive(Debug, Clone)]
struct Node {
    is_dir: bool,
    mode: u32,
    xattrs: BTreeMap<String, Vec<u8>>,
}

impl Node {
    fn dir(mode: u32) -> Self {
        Self {
            is_dir: true,
            mode,
            xattrs: BTreeMap::new(),
        }
    }
}

struct ClusterState {
    nodes: BTreeMap<String, Node>,
    statfs: RawStatVfs,
    conf: BTreeMap<String, String>,
    conf_paths: Vec<Option<String>>,
    /// Per-op queue of (calls to let through first, code to return).
    faults: HashMap<MockOp, VecDeque<(usize, native_code_t)>>,
    calls: HashMap<MockOp, usize>,
    handles_created: usize,
    handles_released: usize,
    open_dirs: usize,
}

impl ClusterState {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::dir(0o755));
        Self {
            nodes,
            statfs: RawStatVfs {
                bsize: 4 << 20,
                frsize: 4 << 20,
                blocks: 1024,
                bfree: 768,
                bavail: 768,
                files: 10,
                ffree: 1 << 20,
                favail: 1 << 20,
                fsid: 0xcef5,
                flag: 0,
                namemax: 255,
            },
            conf: BTreeMap::new(),
            conf_paths: Vec::new(),
            faults: HashMap::new(),
            calls: HashMap::new(),
            handles_created: 0,
            handles_released: 0,
            open_dirs: 0,
        }
    }

    /// Record a call and return the injected fault, if one is due.
    fn enter(&mut self, op: MockOp) -> Option<native_code_t> {
        *self.calls.entry(op).or_insert(0) += 1;
        let queue = self.faults.get_mut(&op)?;
        let (skip, _) = queue.front_mut()?;
        if *skip > 0 {
            *skip -= 1;
            return None;
        }
        queue.pop_front().map(|(_, code)| code)
    }

    fn children(&self, dir: &str) -> Vec<String> {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{}/", dir)
        };
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter(|(k, _)| k.len() > prefix.len() && !k[prefix.len()..].contains('/'))
            .map(|(k, _)| k[prefix.len()..].to_string())
            .collect()
    }

    fn has_children(&self, dir: &str) -> bool {
        !self.children(dir).is_empty()
    }

    fn check_parent_dir(&self, full: &str) -> native_code_t {
        match self.nodes.get(path::parent(full)) {
            None => -libc::ENOENT,
            Some(node) if !node.is_dir => -libc::ENOTDIR,
            Some(_) => 0,
        }
    }
}

/// A shared in-memory cluster and the connector for mounts against it.
#[derive(Clone)]
pub struct MockCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCluster {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ClusterState::new())),
        }
    }

    /// Make the next call of `op` fail with `code`.
    pub fn fail_next(&self, op: MockOp, code: native_code_t) {
        self.fail_nth(op, 0, code);
    }

    /// Let `skip` calls of `op` through, then fail the following one.
    pub fn fail_nth(&self, op: MockOp, skip: usize, code: native_code_t) {
        self.state
            .lock()
            .faults
            .entry(op)
            .or_default()
            .push_back((skip, code));
    }

    pub fn set_statfs(&self, raw: RawStatVfs) {
        self.state.lock().statfs = raw;
    }

    /// Create a directory and any missing parents, bypassing fault injection.
    pub fn mkdir_all(&self, dir: &str) {
        let full = path::normalize(dir);
        let mut state = self.state.lock();
        let mut current = String::new();
        for component in full.split('/').filter(|c| !c.is_empty()) {
            current.push('/');
            current.push_str(component);
            state
                .nodes
                .entry(current.clone())
                .or_insert_with(|| Node::dir(0o755));
        }
    }

    /// Set an attribute directly, bypassing fault injection.
    pub fn put_xattr(&self, at: &str, name: &str, value: &[u8]) {
        let full = path::normalize(at);
        if let Some(node) = self.state.lock().nodes.get_mut(&full) {
            node.xattrs.insert(name.to_string(), value.to_vec());
        }
    }

    pub fn exists(&self, at: &str) -> bool {
        self.state.lock().nodes.contains_key(&path::normalize(at))
    }

    pub fn mode_of(&self, at: &str) -> Option<u32> {
        self.state
            .lock()
            .nodes
            .get(&path::normalize(at))
            .map(|n| n.mode)
    }

    pub fn conf_value(&self, key: &str) -> Option<String> {
        self.state.lock().conf.get(key).cloned()
    }

    /// Paths passed to `conf_read_file`, in call order (`None` = default).
    pub fn conf_paths(&self) -> Vec<Option<String>> {
        self.state.lock().conf_paths.clone()
    }

    /// Number of calls made to `op`, including failed ones.
    pub fn calls(&self, op: MockOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn handles_created(&self) -> usize {
        self.state.lock().handles_created
    }

    pub fn handles_released(&self) -> usize {
        self.state.lock().handles_released
    }

    /// Directory cursors opened and not yet closed.
    pub fn open_dirs(&self) -> usize {
        self.state.lock().open_dirs
    }
}

impl MountConnector for MockCluster {
    type Mount = MockMount;

    fn create(&self, _client_id: Option<&CStr>) -> Result<MockMount, native_code_t> {
        let mut state = self.state.lock();
        if let Some(code) = state.enter(MockOp::Create) {
            return Err(code);
        }
        state.handles_created += 1;
        Ok(MockMount {
            cluster: self.state.clone(),
            root: "/".to_string(),
            cwd: "/".to_string(),
            mounted: false,
            released: false,
        })
    }
}

/// A directory cursor: a snapshot of entry names taken at `opendir`.
pub struct MockDir {
    entries: VecDeque<String>,
}

/// A mount handle against a [`MockCluster`].
pub struct MockMount {
    cluster: Arc<Mutex<ClusterState>>,
    root: String,
    cwd: String,
    mounted: bool,
    released: bool,
}

fn to_str(s: &CStr) -> String {
    s.to_string_lossy().into_owned()
}

/// Copy `data` into `buf` following the sized-call length protocol.
fn copy_out(data: &[u8], buf: &mut [u8]) -> native_code_t {
    let Ok(len) = native_code_t::try_from(data.len()) else {
        return -libc::E2BIG;
    };
    if buf.is_empty() {
        return len;
    }
    if buf.len() < data.len() {
        return -libc::ERANGE;
    }
    buf[..data.len()].copy_from_slice(data);
    len
}

impl MockMount {
    /// Translate a client path to a key in the cluster namespace.
    fn full_path(&self, p: &CStr) -> String {
        let in_mount = path::resolve(&self.cwd, &to_str(p));
        if self.root == "/" {
            in_mount
        } else {
            path::normalize(&format!("{}{}", self.root, in_mount))
        }
    }

    /// Common preamble: fault injection, then mount-state checks.
    fn enter(&self, state: &mut ClusterState, op: MockOp) -> Option<native_code_t> {
        if let Some(code) = state.enter(op) {
            return Some(code);
        }
        if self.released || !self.mounted {
            return Some(-libc::ENOTCONN);
        }
        None
    }
}

impl MountStub for MockMount {
    type Dir = MockDir;

    fn conf_read_file(&mut self, path: Option<&CStr>) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = state.enter(MockOp::ConfReadFile) {
            return code;
        }
        if self.released {
            return -libc::ENOTCONN;
        }
        state.conf_paths.push(path.map(to_str));
        0
    }

    fn conf_set(&mut self, option: &CStr, value: &CStr) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = state.enter(MockOp::ConfSet) {
            return code;
        }
        if self.released {
            return -libc::ENOTCONN;
        }
        state.conf.insert(to_str(option), to_str(value));
        0
    }

    fn mount(&mut self, root: Option<&CStr>) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = state.enter(MockOp::Mount) {
            return code;
        }
        if self.released {
            return -libc::ENOTCONN;
        }
        if self.mounted {
            return -libc::EISCONN;
        }
        let root = root.map(|r| path::normalize(&to_str(r))).unwrap_or_else(|| "/".to_string());
        match state.nodes.get(&root) {
            None => return -libc::ENOENT,
            Some(node) if !node.is_dir => return -libc::ENOTDIR,
            Some(_) => {}
        }
        self.root = root;
        self.cwd = "/".to_string();
        self.mounted = true;
        0
    }

    fn sync_fs(&mut self) -> native_code_t {
        let mut state = self.cluster.lock();
        self.enter(&mut state, MockOp::SyncFs).unwrap_or(0)
    }

    fn chdir(&mut self, p: &CStr) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = self.enter(&mut state, MockOp::Chdir) {
            return code;
        }
        let full = self.full_path(p);
        match state.nodes.get(&full) {
            None => -libc::ENOENT,
            Some(node) if !node.is_dir => -libc::ENOTDIR,
            Some(_) => {
                self.cwd = path::resolve(&self.cwd, &to_str(p));
                0
            }
        }
    }

    fn mkdir(&mut self, p: &CStr, mode: u32) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = self.enter(&mut state, MockOp::Mkdir) {
            return code;
        }
        let full = self.full_path(p);
        if state.nodes.contains_key(&full) {
            return -libc::EEXIST;
        }
        let ret = state.check_parent_dir(&full);
        if ret < 0 {
            return ret;
        }
        state.nodes.insert(full, Node::dir(mode & 0o7777));
        0
    }

    fn rmdir(&mut self, p: &CStr) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = self.enter(&mut state, MockOp::Rmdir) {
            return code;
        }
        let full = self.full_path(p);
        if full == self.root {
            return -libc::EBUSY;
        }
        match state.nodes.get(&full) {
            None => return -libc::ENOENT,
            Some(node) if !node.is_dir => return -libc::ENOTDIR,
            Some(_) => {}
        }
        if state.has_children(&full) {
            return -libc::ENOTEMPTY;
        }
        state.nodes.remove(&full);
        0
    }

    fn rename(&mut self, from: &CStr, to: &CStr) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = self.enter(&mut state, MockOp::Rename) {
            return code;
        }
        let src = self.full_path(from);
        let dst = self.full_path(to);
        if src == self.root {
            return -libc::EBUSY;
        }
        if !state.nodes.contains_key(&src) {
            return -libc::ENOENT;
        }
        if src == dst {
            return 0;
        }
        if dst.starts_with(&format!("{}/", src)) {
            return -libc::EINVAL;
        }
        let ret = state.check_parent_dir(&dst);
        if ret < 0 {
            return ret;
        }
        if let Some(existing) = state.nodes.get(&dst) {
            if existing.is_dir && state.has_children(&dst) {
                return -libc::ENOTEMPTY;
            }
        }

        let src_prefix = format!("{}/", src);
        let moved: Vec<String> = state
            .nodes
            .keys()
            .filter(|k| **k == src || k.starts_with(&src_prefix))
            .cloned()
            .collect();
        state.nodes.remove(&dst);
        for key in moved {
            if let Some(node) = state.nodes.remove(&key) {
                let new_key = format!("{}{}", dst, &key[src.len()..]);
                state.nodes.insert(new_key, node);
            }
        }
        0
    }

    fn opendir(&mut self, p: &CStr) -> Result<MockDir, native_code_t> {
        let mut state = self.cluster.lock();
        if let Some(code) = self.enter(&mut state, MockOp::Opendir) {
            return Err(code);
        }
        let full = self.full_path(p);
        match state.nodes.get(&full) {
            None => return Err(-libc::ENOENT),
            Some(node) if !node.is_dir => return Err(-libc::ENOTDIR),
            Some(_) => {}
        }
        let mut entries: VecDeque<String> = VecDeque::new();
        entries.push_back(".".to_string());
        entries.push_back("..".to_string());
        entries.extend(state.children(&full));
        state.open_dirs += 1;
        Ok(MockDir { entries })
    }

    fn readdir(&mut self, dir: &mut MockDir, name: &mut Vec<u8>) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = self.enter(&mut state, MockOp::Readdir) {
            return code;
        }
        match dir.entries.pop_front() {
            Some(entry) => {
                name.clear();
                name.extend_from_slice(entry.as_bytes());
                1
            }
            None => 0,
        }
    }

    fn closedir(&mut self, _dir: MockDir) -> native_code_t {
        let mut state = self.cluster.lock();
        // The cursor is consumed either way, as with ceph_closedir.
        state.open_dirs = state.open_dirs.saturating_sub(1);
        if let Some(code) = state.enter(MockOp::Closedir) {
            return code;
        }
        0
    }

    fn statfs(&mut self, p: &CStr, out: &mut RawStatVfs) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = self.enter(&mut state, MockOp::Statfs) {
            return code;
        }
        if !state.nodes.contains_key(&self.full_path(p)) {
            return -libc::ENOENT;
        }
        *out = state.statfs;
        0
    }

    fn getxattr(&mut self, p: &CStr, name: &CStr, buf: &mut [u8]) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = self.enter(&mut state, MockOp::Getxattr) {
            return code;
        }
        let Some(node) = state.nodes.get(&self.full_path(p)) else {
            return -libc::ENOENT;
        };
        match node.xattrs.get(&to_str(name)) {
            None => -ENOATTR,
            Some(value) => copy_out(value, buf),
        }
    }

    fn listxattr(&mut self, p: &CStr, buf: &mut [u8]) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = self.enter(&mut state, MockOp::Listxattr) {
            return code;
        }
        let Some(node) = state.nodes.get(&self.full_path(p)) else {
            return -libc::ENOENT;
        };
        let mut list = Vec::new();
        for key in node.xattrs.keys() {
            list.extend_from_slice(key.as_bytes());
            list.push(0);
        }
        copy_out(&list, buf)
    }

    fn setxattr(
        &mut self,
        p: &CStr,
        name: &CStr,
        value: &[u8],
        flags: XattrFlags,
    ) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = self.enter(&mut state, MockOp::Setxattr) {
            return code;
        }
        let full = self.full_path(p);
        let Some(node) = state.nodes.get_mut(&full) else {
            return -libc::ENOENT;
        };
        let key = to_str(name);
        if !key.contains('.') {
            return -libc::EOPNOTSUPP;
        }
        let exists = node.xattrs.contains_key(&key);
        match flags {
            XattrFlags::Create if exists => return -libc::EEXIST,
            XattrFlags::Replace if !exists => return -ENOATTR,
            _ => {}
        }
        node.xattrs.insert(key, value.to_vec());
        0
    }

    fn removexattr(&mut self, p: &CStr, name: &CStr) -> native_code_t {
        let mut state = self.cluster.lock();
        if let Some(code) = self.enter(&mut state, MockOp::Removexattr) {
            return code;
        }
        let full = self.full_path(p);
        let Some(node) = state.nodes.get_mut(&full) else {
            return -libc::ENOENT;
        };
        match node.xattrs.remove(&to_str(name)) {
            Some(_) => 0,
            None => -ENOATTR,
        }
    }

    fn release(&mut self) -> native_code_t {
        let mut state = self.cluster.lock();
        self.mounted = false;
        self.released = true;
        state.handles_released += 1;
        0
    }
}

impl Drop for MockMount {
    fn drop(&mut self) {
        if !self.released {
            self.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    fn mounted(cluster: &MockCluster) -> MockMount {
        let mut m = cluster.create(None).unwrap();
        assert_eq!(m.mount(None), 0);
        m
    }

    #[test]
    fn test_ops_before_mount_fail() {
        let cluster = MockCluster::new();
        let mut m = cluster.create(None).unwrap();
        assert_eq!(m.mkdir(&c("/a"), 0o755), -libc::ENOTCONN);
        assert_eq!(m.sync_fs(), -libc::ENOTCONN);
    }

    #[test]
    fn test_mkdir_semantics() {
        let cluster = MockCluster::new();
        let mut m = mounted(&cluster);
        assert_eq!(m.mkdir(&c("/a"), 0o750), 0);
        assert_eq!(m.mkdir(&c("/a"), 0o750), -libc::EEXIST);
        assert_eq!(m.mkdir(&c("/missing/b"), 0o755), -libc::ENOENT);
        assert_eq!(cluster.mode_of("/a"), Some(0o750));
    }

    #[test]
    fn test_getxattr_length_protocol() {
        let cluster = MockCluster::new();
        cluster.put_xattr("/", "user.k", b"hello");
        let mut m = mounted(&cluster);

        assert_eq!(m.getxattr(&c("/"), &c("user.k"), &mut []), 5);
        let mut small = [0u8; 2];
        assert_eq!(m.getxattr(&c("/"), &c("user.k"), &mut small), -libc::ERANGE);
        let mut buf = [0u8; 8];
        assert_eq!(m.getxattr(&c("/"), &c("user.k"), &mut buf), 5);
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(m.getxattr(&c("/"), &c("user.none"), &mut buf), -ENOATTR);
    }

    #[test]
    fn test_setxattr_flags() {
        let cluster = MockCluster::new();
        let mut m = mounted(&cluster);
        let (p, k) = (c("/"), c("user.k"));
        assert_eq!(m.setxattr(&p, &k, b"1", XattrFlags::Replace), -ENOATTR);
        assert_eq!(m.setxattr(&p, &k, b"1", XattrFlags::Create), 0);
        assert_eq!(m.setxattr(&p, &k, b"2", XattrFlags::Create), -libc::EEXIST);
        assert_eq!(m.setxattr(&p, &k, b"2", XattrFlags::Replace), 0);
        assert_eq!(m.setxattr(&p, &c("nonamespace"), b"x", XattrFlags::Upsert), -libc::EOPNOTSUPP);
    }

    #[test]
    fn test_readdir_and_cursor_accounting() {
        let cluster = MockCluster::new();
        cluster.mkdir_all("/d/x");
        cluster.mkdir_all("/d/y/z");
        let mut m = mounted(&cluster);

        let mut dir = m.opendir(&c("/d")).unwrap();
        assert_eq!(cluster.open_dirs(), 1);
        let mut names = Vec::new();
        let mut name = Vec::new();
        while m.readdir(&mut dir, &mut name) == 1 {
            names.push(String::from_utf8(name.clone()).unwrap());
        }
        assert_eq!(names, vec![".", "..", "x", "y"]);
        assert_eq!(m.closedir(dir), 0);
        assert_eq!(cluster.open_dirs(), 0);
    }

    #[test]
    fn test_rename_moves_subtree() {
        let cluster = MockCluster::new();
        cluster.mkdir_all("/a/b/c");
        let mut m = mounted(&cluster);
        assert_eq!(m.rename(&c("/a"), &c("/z")), 0);
        assert!(cluster.exists("/z/b/c"));
        assert!(!cluster.exists("/a"));
        assert_eq!(m.rename(&c("/z"), &c("/z/b/inner")), -libc::EINVAL);
        assert_eq!(m.rename(&c("/nope"), &c("/x")), -libc::ENOENT);
    }

    #[test]
    fn test_fault_injection_order() {
        let cluster = MockCluster::new();
        cluster.fail_nth(MockOp::SyncFs, 1, -libc::EIO);
        let mut m = mounted(&cluster);
        assert_eq!(m.sync_fs(), 0);
        assert_eq!(m.sync_fs(), -libc::EIO);
        assert_eq!(m.sync_fs(), 0);
        assert_eq!(cluster.calls(MockOp::SyncFs), 3);
    }

    #[test]
    fn test_mount_subtree_root() {
        let cluster = MockCluster::new();
        cluster.mkdir_all("/volumes/v1");
        let mut m = cluster.create(None).unwrap();
        assert_eq!(m.mount(Some(&c("/volumes/v1"))), 0);
        assert_eq!(m.mkdir(&c("/inner"), 0o755), 0);
        assert!(cluster.exists("/volumes/v1/inner"));
    }

    #[test]
    fn test_drop_releases_once() {
        let cluster = MockCluster::new();
        {
            let mut m = mounted(&cluster);
            m.release();
        }
        {
            let _m = mounted(&cluster);
        }
        assert_eq!(cluster.handles_created(), 2);
        assert_eq!(cluster.handles_released(), 2);
    }
}
