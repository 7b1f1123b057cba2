//! River network graph: an arena of nodes plus typed flow links.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use crate::config::SystemConfig;
use crate::error::TopologyError;
use crate::nodes::{HydroNode, Node, NodeId, NodeKind};

/// How water travels along a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// Reservoir intake to its power station.
    Tunnel,
    /// Reservoir bottom outlet.
    Hatch,
    /// Reservoir seasonal release outlet.
    MinRelease,
    /// Reservoir overflow and forced spill.
    Spill,
    /// Station or junction outflow.
    Downstream,
}

impl LinkKind {
    /// Preference when picking the main path of a node with several outlets.
    fn rank(self) -> u8 {
        match self {
            LinkKind::Tunnel => 0,
            LinkKind::Downstream => 1,
            LinkKind::Spill => 2,
            LinkKind::Hatch => 3,
            LinkKind::MinRelease => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LinkKind::Tunnel => "tunnel",
            LinkKind::Hatch => "hatch",
            LinkKind::MinRelease => "min_release",
            LinkKind::Spill => "spill",
            LinkKind::Downstream => "downstream",
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A directed flow connection between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: LinkKind,
}

/// Directed acyclic river network.
///
/// Nodes live in a contiguous arena indexed by [`NodeId`]; links refer to
/// nodes by index. The calculation order visits every node after all of
/// its upstream neighbours.
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<Node>,
    links: Vec<Link>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    order: Vec<NodeId>,
    feeders: Vec<Option<NodeId>>,
}

impl Topology {
    /// Builds and checks the network described by `config`.
    ///
    /// # Errors
    ///
    /// Returns a `TopologyError` for id layout problems, invalid node
    /// parameters, dangling or self links, tunnels that do not end at a
    /// power station, stations without exactly one feeding tunnel, and
    /// cycles.
    pub fn build(config: &SystemConfig) -> Result<Self, TopologyError> {
        let defs = config.nodes_by_id();
        if defs.is_empty() {
            return Err(TopologyError::Empty);
        }
        for (expected, def) in defs.iter().enumerate() {
            if expected > 0 && defs[expected - 1].id() == def.id() {
                return Err(TopologyError::DuplicateId(def.id()));
            }
            if def.id() != expected {
                return Err(TopologyError::NonContiguousIds {
                    expected,
                    found: def.id(),
                });
            }
        }

        let nodes = defs
            .iter()
            .map(|def| {
                Node::from_config(def).map_err(|reason| TopologyError::InvalidNode {
                    node: def.id(),
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let count = nodes.len();
        let links: Vec<Link> = nodes.iter().flat_map(node_links).collect();
        let mut outgoing = vec![Vec::new(); count];
        let mut incoming = vec![Vec::new(); count];
        for (i, link) in links.iter().enumerate() {
            if link.to >= count {
                return Err(TopologyError::UnknownNode {
                    from: link.from,
                    to: link.to,
                    link: link.kind.name(),
                });
            }
            if link.to == link.from {
                return Err(TopologyError::SelfLoop(link.from));
            }
            outgoing[link.from].push(i);
            incoming[link.to].push(i);
        }

        let mut feeders = vec![None; count];
        for (id, node) in nodes.iter().enumerate() {
            for link in outgoing[id].iter().map(|&i| &links[i]) {
                if link.kind == LinkKind::Tunnel && nodes[link.to].kind() != NodeKind::PowerStation
                {
                    return Err(TopologyError::TunnelTarget {
                        reservoir: id,
                        target: link.to,
                        kind: nodes[link.to].kind(),
                    });
                }
            }
            if node.kind() == NodeKind::PowerStation {
                let tunnels: Vec<NodeId> = incoming[id]
                    .iter()
                    .map(|&i| &links[i])
                    .filter(|l| l.kind == LinkKind::Tunnel)
                    .map(|l| l.from)
                    .collect();
                match tunnels.as_slice() {
                    [] => return Err(TopologyError::UnfedStation(id)),
                    [feeder] => feeders[id] = Some(*feeder),
                    _ => {
                        return Err(TopologyError::SharedStation {
                            station: id,
                            feeders: tunnels,
                        });
                    }
                }
            }
        }

        let order = calculation_order(count, &links, &outgoing, &incoming)?;

        Ok(Self {
            nodes,
            links,
            outgoing,
            incoming,
            order,
            feeders,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(id).map(HydroNode::kind)
    }

    pub fn kinds(&self) -> Vec<NodeKind> {
        self.nodes.iter().map(HydroNode::kind).collect()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Links leaving `id`.
    pub fn downstream(&self, id: NodeId) -> impl Iterator<Item = &Link> {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .map(|&i| &self.links[i])
    }

    /// Links arriving at `id`.
    pub fn upstream(&self, id: NodeId) -> impl Iterator<Item = &Link> {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .map(|&i| &self.links[i])
    }

    /// Node ids with every node after its upstream neighbours.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Reservoir feeding `station` through its tunnel.
    pub fn feeder(&self, station: NodeId) -> Option<NodeId> {
        self.feeders.get(station).copied().flatten()
    }

    /// Main path out of `id`: tunnel, then downstream, spill, hatch, and
    /// seasonal release.
    pub fn primary_downstream(&self, id: NodeId) -> Option<NodeId> {
        self.downstream(id)
            .min_by_key(|l| l.kind.rank())
            .map(|l| l.to)
    }
}

fn node_links(node: &Node) -> Vec<Link> {
    let from = node.id();
    let mut links = Vec::new();
    let mut push = |to: Option<NodeId>, kind| {
        if let Some(to) = to {
            links.push(Link { from, to, kind });
        }
    };
    match node {
        Node::Reservoir(r) => {
            push(r.tunnel, LinkKind::Tunnel);
            push(r.hatch.as_ref().and_then(|h| h.to), LinkKind::Hatch);
            push(r.min_release.as_ref().and_then(|m| m.to), LinkKind::MinRelease);
            push(r.spill_to, LinkKind::Spill);
        }
        Node::PowerStation(p) => push(p.downstream, LinkKind::Downstream),
        Node::Junction(j) => push(j.downstream, LinkKind::Downstream),
    }
    links
}

/// Kahn's algorithm; ties resolve to the lowest id first.
fn calculation_order(
    count: usize,
    links: &[Link],
    outgoing: &[Vec<usize>],
    incoming: &[Vec<usize>],
) -> Result<Vec<NodeId>, TopologyError> {
    let mut in_degree: Vec<usize> = incoming.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<NodeId>> = (0..count)
        .filter(|&n| in_degree[n] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(count);

    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &i in &outgoing[node] {
            let child = links[i].to;
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                ready.push(Reverse(child));
            }
        }
    }

    if order.len() != count {
        let nodes = (0..count).filter(|&n| in_degree[n] > 0).collect();
        return Err(TopologyError::Cycle { nodes });
    }
    Ok(order)
}
