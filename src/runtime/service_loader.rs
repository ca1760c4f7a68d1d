//! Peer plug-in discovery (spec.md §9: "service discovery").
//!
//! The default binding (`DylibServiceLoader`) uses the host's native
//! plug-in discovery — `libloading`, a `dlopen` facility with no
//! precedent in the teacher (whose own plug-in-like mechanism is WASM
//! guest loading via `wasmtime`, not native dylibs); see DESIGN.md for
//! the actual grounding. Tests substitute [`StaticServiceLoader`], an
//! in-memory list, and the core never assumes a specific binding
//! (spec.md §9).

use std::path::{Path, PathBuf};

use crate::blob::Peer;

/// A loaded peer plug-in. Every peer must produce a [`Peer`] value
/// when asked.
pub trait PeerFactory: Send + Sync {
    fn open_peer(&self) -> anyhow::Result<Peer>;
}

/// The well-known symbol every plug-in dylib must export: a function
/// taking no arguments and returning a freshly-boxed [`PeerFactory`].
///
/// This assumes the plug-in was built with the same compiler version
/// as the host, since trait object layout is not a stable ABI across
/// compiler versions — acceptable for a single-vendor plug-in
/// directory, not for third-party distribution.
pub type PeerFactoryConstructor = unsafe fn() -> Box<dyn PeerFactory>;

pub const PEER_FACTORY_SYMBOL: &[u8] = b"sunburst_peer_factory";

/// `load<T>() → lazy sequence of () → T` (spec.md §9), specialized to
/// `T = PeerFactory`. Each entry may independently fail — a single
/// broken plug-in must not prevent the others from loading.
pub trait ServiceLoader {
    fn load(&self) -> Vec<anyhow::Result<Box<dyn PeerFactory>>>;
}

/// Discovers peer factories by `dlopen`-ing every dynamic library in a
/// directory and invoking its [`PEER_FACTORY_SYMBOL`].
pub struct DylibServiceLoader {
    directory: PathBuf,
}

impl DylibServiceLoader {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn is_dylib(path: &Path) -> bool {
        let extension = path.extension().and_then(|ext| ext.to_str());
        matches!(extension, Some("so") | Some("dylib") | Some("dll"))
    }

    fn load_one(path: &Path) -> anyhow::Result<Box<dyn PeerFactory>> {
        // SAFETY: the caller is trusted to only place Sunburst peer
        // plug-ins, built against this crate's ABI, in the scanned
        // directory.
        unsafe {
            let library = libloading::Library::new(path)?;
            let constructor: libloading::Symbol<PeerFactoryConstructor> = library.get(PEER_FACTORY_SYMBOL)?;
            let factory = constructor();
            Ok(Box::new(LoadedDylibFactory {
                _library: library,
                factory,
            }))
        }
    }
}

impl ServiceLoader for DylibServiceLoader {
    #[tracing::instrument(level = "debug", skip(self))]
    fn load(&self) -> Vec<anyhow::Result<Box<dyn PeerFactory>>> {
        let entries = match std::fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(err) => return vec![Err(err.into())],
        };

        entries
            .filter_map(|entry| match entry {
                Ok(entry) if Self::is_dylib(&entry.path()) => Some(Self::load_one(&entry.path())),
                Ok(_) => None,
                Err(err) => Some(Err(err.into())),
            })
            .collect()
    }
}

/// Keeps the backing [`libloading::Library`] alive for exactly as long
/// as the trait object obtained from it, per `libloading`'s safety
/// contract. Field order matters here: Rust drops struct fields in
/// declaration order, so `factory` (whose vtable and drop glue live
/// inside the dylib) must be declared, and therefore dropped, before
/// `_library` unloads it.
struct LoadedDylibFactory {
    factory: Box<dyn PeerFactory>,
    _library: libloading::Library,
}

impl PeerFactory for LoadedDylibFactory {
    fn open_peer(&self) -> anyhow::Result<Peer> {
        self.factory.open_peer()
    }
}

/// Test-only loader wrapping an in-memory list of suppliers (spec.md
/// §9: "tests substitute an in-memory list").
#[derive(Default)]
pub struct StaticServiceLoader {
    suppliers: Vec<Box<dyn Fn() -> anyhow::Result<Box<dyn PeerFactory>>>>,
}

impl StaticServiceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factory<F>(mut self, supplier: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn PeerFactory>> + 'static,
    {
        self.suppliers.push(Box::new(supplier));
        self
    }
}

impl ServiceLoader for StaticServiceLoader {
    fn load(&self) -> Vec<anyhow::Result<Box<dyn PeerFactory>>> {
        self.suppliers.iter().map(|supplier| supplier()).collect()
    }
}

#[cfg(test)]
pub(crate) struct FixedPeerFactory(pub Peer);

#[cfg(test)]
impl PeerFactory for FixedPeerFactory {
    fn open_peer(&self) -> anyhow::Result<Peer> {
        Ok(self.0.clone())
    }
}
