//! Cluster target deployer
//!
//! A cluster is N standalone runtimes wired together. Deploying applies the
//! per-node standalone algorithm to every member sequentially; the first
//! node failure aborts the whole operation. Membership must be wired across
//! the member set (by the configurator) before any node is started.

use std::fs;
use std::path::PathBuf;

use crate::config::{DeploymentConfig, DeploymentTarget};
use crate::controller::{RuntimeController, ScriptController, SystemRunner};
use crate::error::{DeployError, DeployResult};

use super::standalone::StandaloneDeployer;
use super::ArtifactDeployer;

/// Largest member count the platform supports
pub const MAX_CLUSTER_NODES: usize = 8;

/// Writes cluster membership into every member's runtime home
///
/// Each node gets a `.cluster/cluster.properties` naming the cluster, its
/// own node id and the full member count. The runtimes read this file at
/// startup, so it has to be in place before any node starts.
pub struct ClusterConfigurator {
    cluster_name: String,
}

impl ClusterConfigurator {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
        }
    }

    pub fn configure(&self, homes: &[PathBuf]) -> DeployResult<()> {
        for (index, home) in homes.iter().enumerate() {
            let dir = home.join(".cluster");
            fs::create_dir_all(&dir)?;
            let properties = format!(
                "cluster.name={}\nnode.id={}\ncluster.size={}\n",
                self.cluster_name,
                index + 1,
                homes.len()
            );
            fs::write(dir.join("cluster.properties"), properties)?;
        }
        log::info!(
            "Configured cluster '{}' across {} nodes",
            self.cluster_name,
            homes.len()
        );
        Ok(())
    }
}

/// Deployer applying the standalone algorithm to every cluster member
pub struct ClusterDeployer<C: RuntimeController> {
    nodes: Vec<StandaloneDeployer<C>>,
    /// Membership wiring, applied on the deploy paths only; undeploying
    /// never rewrites cluster configuration.
    configurator: Option<(ClusterConfigurator, Vec<PathBuf>)>,
}

impl ClusterDeployer<ScriptController<SystemRunner>> {
    pub fn from_config(config: &DeploymentConfig) -> DeployResult<Self> {
        if config.cluster_homes.is_empty() {
            return Err(DeployError::MissingField {
                field: "cluster-homes",
                target: DeploymentTarget::Cluster,
            });
        }
        let cluster_name = config
            .target_name
            .clone()
            .unwrap_or_else(|| format!("{}-cluster", config.application_name));
        let nodes = config
            .cluster_homes
            .iter()
            .map(|home| StandaloneDeployer::new(ScriptController::new(home), home.clone(), config))
            .collect();
        // The size check must fire before any member home is touched.
        Ok(Self::new(nodes)?.with_configurator(
            ClusterConfigurator::new(cluster_name),
            config.cluster_homes.clone(),
        ))
    }
}

impl<C: RuntimeController> ClusterDeployer<C> {
    pub fn new(nodes: Vec<StandaloneDeployer<C>>) -> DeployResult<Self> {
        if nodes.len() > MAX_CLUSTER_NODES {
            return Err(DeployError::ClusterTooLarge {
                size: nodes.len(),
                max: MAX_CLUSTER_NODES,
            });
        }
        Ok(Self {
            nodes,
            configurator: None,
        })
    }

    /// Wire cluster membership into the member homes before deploying
    pub fn with_configurator(
        mut self,
        configurator: ClusterConfigurator,
        homes: Vec<PathBuf>,
    ) -> Self {
        self.configurator = Some((configurator, homes));
        self
    }

    fn wire_membership(&self) -> DeployResult<()> {
        if let Some((configurator, homes)) = &self.configurator {
            configurator.configure(homes)?;
        }
        Ok(())
    }

    fn each_node<F>(&self, operation: &str, op: F) -> DeployResult<()>
    where
        F: Fn(&StandaloneDeployer<C>) -> DeployResult<()>,
    {
        for (index, node) in self.nodes.iter().enumerate() {
            log::info!(
                "{} on cluster node {}/{}",
                operation,
                index + 1,
                self.nodes.len()
            );
            op(node).map_err(|e| {
                log::error!(
                    "{} failed on cluster node {}/{}; aborting",
                    operation,
                    index + 1,
                    self.nodes.len()
                );
                e
            })?;
        }
        Ok(())
    }
}

impl<C: RuntimeController> ArtifactDeployer for ClusterDeployer<C> {
    fn deploy_application(&self) -> DeployResult<()> {
        self.wire_membership()?;
        self.each_node("Deploying application", |node| node.deploy_application())
    }

    fn undeploy_application(&self) -> DeployResult<()> {
        self.each_node("Undeploying application", |node| node.undeploy_application())
    }

    fn deploy_domain(&self) -> DeployResult<()> {
        self.wire_membership()?;
        self.each_node("Deploying domain", |node| node.deploy_domain())
    }

    fn undeploy_domain(&self) -> DeployResult<()> {
        self.each_node("Undeploying domain", |node| node.undeploy_domain())
    }
}
