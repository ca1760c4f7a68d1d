//! The runtime context: loaded peers plus their validated imports,
//! exposing file lookup (spec.md §4.F).

pub mod service_loader;

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::warn;

use crate::error::SunburstError;
use crate::identity::{PackageIdentifier, PackageName, Path};
use crate::inventory::Inventory;
pub use service_loader::{DylibServiceLoader, PeerFactory, ServiceLoader, StaticServiceLoader};

/// A problem recorded while loading peers. Peer loading never throws
/// to the caller (spec.md §7): every failure becomes one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeProblem {
    BrokenPeerFactory { reason: String },
    ConflictingPeer { package_name: String },
    UnsatisfiedRequirement { peer_name: String, required: PackageIdentifier },
    /// The peer itself declared something malformed (e.g. an import
    /// name that is not a valid package name) — a fault in the peer's
    /// own declaration, not a catalog lookup failure (spec.md §4.F,
    /// `error-peer-misconfigured`).
    PeerMisconfigured { peer_name: String, reason: String },
    /// A catalog error surfaced while validating a peer's imports
    /// against the inventory (spec.md §4.F).
    InventoryProblem { reason: String },
}

/// The set of problems recorded during the last `open`/`reload`.
#[derive(Debug, Clone, Default)]
pub struct RuntimeStatus {
    problems: Vec<RuntimeProblem>,
}

impl RuntimeStatus {
    pub fn problems(&self) -> &[RuntimeProblem] {
        &self.problems
    }

    /// A context is "successful" iff its status has no problems
    /// (spec.md §4.F).
    pub fn is_failed(&self) -> bool {
        !self.problems.is_empty()
    }
}

/// The loaded set of peers plus their validated imports (glossary).
pub struct RuntimeContext {
    peers: HashMap<String, crate::blob::Peer>,
    status: RuntimeStatus,
}

impl RuntimeContext {
    /// Loads peers via `loader` against `inventory`, as `reload` does
    /// on an already-constructed context (spec.md §4.F `open`/`reload`).
    pub fn open(inventory: &mut Inventory, loader: &dyn ServiceLoader) -> Result<Self, SunburstError> {
        let mut context = Self {
            peers: HashMap::new(),
            status: RuntimeStatus::default(),
        };
        context.reload(inventory, loader)?;
        Ok(context)
    }

    /// Re-runs peer discovery and import validation from scratch,
    /// replacing the previously loaded peer map and status (spec.md
    /// §4.F: "all of `reload`... are idempotent in effect").
    #[tracing::instrument(level = "debug", skip(self, inventory, loader))]
    pub fn reload(&mut self, inventory: &mut Inventory, loader: &dyn ServiceLoader) -> Result<(), SunburstError> {
        let tx = inventory.begin()?;

        let mut peers = HashMap::new();
        let mut problems = Vec::new();

        for supplier_result in loader.load() {
            let factory = match supplier_result {
                Ok(factory) => factory,
                Err(err) => {
                    warn!(%err, "peer factory supplier failed");
                    problems.push(RuntimeProblem::BrokenPeerFactory { reason: err.to_string() });
                    continue;
                }
            };

            let peer = match factory.open_peer() {
                Ok(peer) => peer,
                Err(err) => {
                    warn!(%err, "peer factory failed to open a peer");
                    problems.push(RuntimeProblem::BrokenPeerFactory { reason: err.to_string() });
                    continue;
                }
            };

            if peers.contains_key(&peer.package_name) {
                problems.push(RuntimeProblem::ConflictingPeer {
                    package_name: peer.package_name.clone(),
                });
                continue;
            }

            let mut satisfied = true;
            for (name, version) in &peer.imports {
                let name = match PackageName::parse(name) {
                    Ok(name) => name,
                    Err(err) => {
                        let misconfigured = SunburstError::peer_misconfigured(&peer.package_name, &err);
                        problems.push(RuntimeProblem::PeerMisconfigured {
                            peer_name: peer.package_name.clone(),
                            reason: misconfigured.to_string(),
                        });
                        satisfied = false;
                        break;
                    }
                };
                let identifier = PackageIdentifier::new(name, version.clone());
                match tx.package_get(&identifier) {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        problems.push(RuntimeProblem::UnsatisfiedRequirement {
                            peer_name: peer.package_name.clone(),
                            required: identifier,
                        });
                        satisfied = false;
                        break;
                    }
                    Err(err) => {
                        problems.push(RuntimeProblem::InventoryProblem { reason: err.to_string() });
                        satisfied = false;
                        break;
                    }
                }
            }

            if satisfied {
                peers.insert(peer.package_name.clone(), peer);
            }
        }

        tx.close()?;

        self.peers = peers;
        self.status = RuntimeStatus { problems };
        Ok(())
    }

    pub fn status(&self) -> &RuntimeStatus {
        &self.status
    }

    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }

    /// Resolves `(requester, targetPackage, path) → filesystem path`
    /// (spec.md §4.F `findFile`).
    pub fn find_file(
        &self,
        inventory: &mut Inventory,
        requester: &str,
        target_package: &str,
        path: &Path,
    ) -> Result<PathBuf, SunburstError> {
        let peer = self.peers.get(requester).ok_or_else(|| SunburstError::peer_missing(requester))?;
        let version = peer
            .imports
            .get(target_package)
            .ok_or_else(|| SunburstError::peer_import_missing(requester, target_package))?;

        let identifier = PackageIdentifier::new(PackageName::parse(target_package)?, version.clone());

        let tx = inventory.begin()?;
        let result = tx.blob_file(&identifier, path);
        tx.close()?;
        result
    }
}
