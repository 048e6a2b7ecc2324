use crate::body::{Constraint, ConstraintId, Muscle, Particle, ParticleId, ParticleIndex};
use crate::math::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::{error::Error, fmt};

/// Structural defects found while validating a blueprint. All are fatal: a run
/// never starts on a topology that failed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum TopologyError {
    NoParticles,
    NoMuscles,
    DuplicateParticleId(ParticleId),
    DuplicateLinkId(ConstraintId),
    DanglingReference {
        link: ConstraintId,
        particle: ParticleId,
    },
    SelfLoop(ConstraintId),
    Disconnected {
        reachable: usize,
        total: usize,
    },
    InvalidParticle(ParticleId),
    InvalidLink(ConstraintId),
    UnknownRoleParticle(ParticleId),
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyError::NoParticles => write!(f, "topology has no particles"),
            TopologyError::NoMuscles => write!(f, "topology needs at least one muscle"),
            TopologyError::DuplicateParticleId(id) => write!(f, "duplicate particle id {id}"),
            TopologyError::DuplicateLinkId(id) => {
                write!(f, "duplicate constraint/muscle id {id}")
            }
            TopologyError::DanglingReference { link, particle } => write!(
                f,
                "link {link} references particle {particle}, which is not declared"
            ),
            TopologyError::SelfLoop(id) => write!(f, "link {id} joins a particle to itself"),
            TopologyError::Disconnected { reachable, total } => write!(
                f,
                "topology is disconnected: {reachable} of {total} particles reachable"
            ),
            TopologyError::InvalidParticle(id) => write!(
                f,
                "particle {id} needs finite position, mass > 0 and radius >= 0"
            ),
            TopologyError::InvalidLink(id) => write!(
                f,
                "link {id} needs finite length >= 0, stiffness/damping in [0,1], amplitude in [0,1] and frequency > 0"
            ),
            TopologyError::UnknownRoleParticle(id) => {
                write!(f, "head/foot particle {id} is not declared")
            }
        }
    }
}

impl Error for TopologyError {}

/// Serialized form of a blueprint. Positions double as the rest pose; muscle
/// oscillation parameters are placeholders overwritten by each genome.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TopologySpec {
    pub particles: Vec<ParticleSpec>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    pub muscles: Vec<MuscleSpec>,
    #[serde(default)]
    pub head: Option<ParticleId>,
    #[serde(default)]
    pub feet: Option<Vec<ParticleId>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticleSpec {
    pub id: ParticleId,
    pub pos: Vec2,
    pub mass: f64,
    pub radius: f64,
    #[serde(default)]
    pub is_locked: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MuscleSpec {
    #[serde(flatten)]
    pub link: Constraint,
    #[serde(default)]
    pub amplitude: f64,
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    #[serde(default)]
    pub phase: f64,
}

fn default_frequency() -> f64 {
    1.0
}

/// Immutable body blueprint shared (via `Arc`) by every creature of a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "TopologySpec", into = "TopologySpec")]
pub struct Topology {
    particles: Vec<Particle>,
    constraints: Vec<Constraint>,
    muscles: Vec<Muscle>,
    index: ParticleIndex,
    head_slot: usize,
    foot_slots: Vec<usize>,
}

impl TryFrom<TopologySpec> for Topology {
    type Error = TopologyError;

    fn try_from(spec: TopologySpec) -> Result<Self, Self::Error> {
        let particles = spec
            .particles
            .into_iter()
            .map(|p| Particle {
                is_locked: p.is_locked,
                ..Particle::new(p.id, p.pos, p.mass, p.radius)
            })
            .collect();
        let muscles = spec
            .muscles
            .into_iter()
            .map(|m| Muscle::new(m.link, m.amplitude, m.frequency, m.phase))
            .collect();
        Topology::new(particles, spec.constraints, muscles, spec.head, spec.feet)
    }
}

impl From<Topology> for TopologySpec {
    fn from(topology: Topology) -> Self {
        let head = Some(topology.head().id);
        let feet = Some(topology.feet().map(|p| p.id).collect());
        TopologySpec {
            particles: topology
                .particles
                .into_iter()
                .map(|p| ParticleSpec {
                    id: p.id,
                    pos: p.pos,
                    mass: p.mass,
                    radius: p.radius,
                    is_locked: p.is_locked,
                })
                .collect(),
            constraints: topology.constraints,
            muscles: topology
                .muscles
                .into_iter()
                .map(|m| MuscleSpec {
                    link: m.link,
                    amplitude: m.amplitude,
                    frequency: m.frequency,
                    phase: m.phase,
                })
                .collect(),
            head,
            feet,
        }
    }
}

impl Topology {
    /// Validate and freeze a blueprint.
    ///
    /// `head` defaults to the highest particle (smallest `y`); `feet` default to
    /// the two lowest particles, ties broken by declaration order.
    pub fn new(
        particles: Vec<Particle>,
        constraints: Vec<Constraint>,
        muscles: Vec<Muscle>,
        head: Option<ParticleId>,
        feet: Option<Vec<ParticleId>>,
    ) -> Result<Self, TopologyError> {
        validate_particles(&particles)?;
        let index = ParticleIndex::build(&particles);
        validate_links(&index, &constraints, &muscles)?;
        validate_connected(&index, &constraints, &muscles)?;

        let head_slot = match head {
            Some(id) => index.get(id).ok_or(TopologyError::UnknownRoleParticle(id))?,
            None => default_head_slot(&particles),
        };
        let foot_slots = match feet {
            Some(ids) => ids
                .into_iter()
                .map(|id| index.get(id).ok_or(TopologyError::UnknownRoleParticle(id)))
                .collect::<Result<Vec<_>, _>>()?,
            None => default_foot_slots(&particles),
        };

        Ok(Self {
            particles,
            constraints,
            muscles,
            index,
            head_slot,
            foot_slots,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn muscles(&self) -> &[Muscle] {
        &self.muscles
    }

    pub fn index(&self) -> &ParticleIndex {
        &self.index
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    pub fn muscle_count(&self) -> usize {
        self.muscles.len()
    }

    /// Slot of the head particle inside any body built from this topology.
    pub fn head_slot(&self) -> usize {
        self.head_slot
    }

    pub fn foot_slots(&self) -> &[usize] {
        &self.foot_slots
    }

    pub fn head(&self) -> &Particle {
        &self.particles[self.head_slot]
    }

    pub fn feet(&self) -> impl Iterator<Item = &Particle> + '_ {
        self.foot_slots.iter().map(|&slot| &self.particles[slot])
    }

    /// Muscle ids in topology order; genomes must list genes in this order.
    pub fn muscle_ids(&self) -> impl ExactSizeIterator<Item = ConstraintId> + '_ {
        self.muscles.iter().map(Muscle::id)
    }

    /// Nine-particle biped. A braced torso box (two shoulders, two hips) holds
    /// the head inside it, so a fallen walker keeps its head off the ground.
    /// Each leg is a hip-knee-foot chain with bent knees. Four muscles drive
    /// the legs: one hip-to-foot extensor per leg and one swing muscle from
    /// each hip to the opposite knee.
    pub fn biped() -> Self {
        const RADIUS: f64 = 5.0;
        let layout = [
            (0, Vec2::new(100.0, 405.0), 1.0),
            (1, Vec2::new(80.0, 390.0), 1.0),
            (2, Vec2::new(120.0, 390.0), 1.0),
            (3, Vec2::new(80.0, 440.0), 2.0),
            (4, Vec2::new(120.0, 440.0), 2.0),
            (5, Vec2::new(66.0, 465.0), 1.0),
            (6, Vec2::new(70.0, 490.0), 1.0),
            (7, Vec2::new(134.0, 465.0), 1.0),
            (8, Vec2::new(130.0, 490.0), 1.0),
        ];
        let particles: Vec<Particle> = layout
            .iter()
            .map(|&(id, pos, mass)| Particle::new(id, pos, mass, RADIUS))
            .collect();
        let length = |a: usize, b: usize| particles[a].pos.distance(particles[b].pos);

        let bones = [
            // torso box and diagonals
            (1, 2),
            (3, 4),
            (1, 3),
            (2, 4),
            (1, 4),
            (2, 3),
            // head to every torso corner
            (0, 1),
            (0, 2),
            (0, 3),
            (0, 4),
            // legs
            (3, 5),
            (5, 6),
            (4, 7),
            (7, 8),
        ];
        let constraints: Vec<Constraint> = bones
            .iter()
            .enumerate()
            .map(|(i, &(a, b))| Constraint::new(i as ConstraintId, a, b, length(a as usize, b as usize)))
            .collect();

        let actuated = [(3, 6), (4, 8), (4, 5), (3, 7)];
        let muscles = actuated
            .iter()
            .enumerate()
            .map(|(i, &(a, b))| {
                let mut link = Constraint::new(
                    (bones.len() + i) as ConstraintId,
                    a,
                    b,
                    length(a as usize, b as usize),
                );
                link.stiffness = 0.8;
                Muscle::new(link, 0.0, 1.0, 0.0)
            })
            .collect();

        Topology::new(particles, constraints, muscles, Some(0), Some(vec![6, 8]))
            .expect("built-in biped is structurally valid")
    }
}

fn validate_particles(particles: &[Particle]) -> Result<(), TopologyError> {
    if particles.is_empty() {
        return Err(TopologyError::NoParticles);
    }
    let mut seen = HashSet::with_capacity(particles.len());
    for p in particles {
        if !seen.insert(p.id) {
            return Err(TopologyError::DuplicateParticleId(p.id));
        }
        let valid = p.pos.is_finite()
            && p.old_pos.is_finite()
            && p.mass.is_finite()
            && p.mass > 0.0
            && p.radius.is_finite()
            && p.radius >= 0.0;
        if !valid {
            return Err(TopologyError::InvalidParticle(p.id));
        }
    }
    Ok(())
}

fn validate_link(index: &ParticleIndex, link: &Constraint) -> Result<(), TopologyError> {
    if link.p1_id == link.p2_id {
        return Err(TopologyError::SelfLoop(link.id));
    }
    for particle in [link.p1_id, link.p2_id] {
        if index.get(particle).is_none() {
            return Err(TopologyError::DanglingReference {
                link: link.id,
                particle,
            });
        }
    }
    let valid = link.rest_length.is_finite()
        && link.rest_length >= 0.0
        && (0.0..=1.0).contains(&link.stiffness)
        && (0.0..=1.0).contains(&link.damping);
    if !valid {
        return Err(TopologyError::InvalidLink(link.id));
    }
    Ok(())
}

fn validate_links(
    index: &ParticleIndex,
    constraints: &[Constraint],
    muscles: &[Muscle],
) -> Result<(), TopologyError> {
    if muscles.is_empty() {
        return Err(TopologyError::NoMuscles);
    }
    let mut seen = HashSet::with_capacity(constraints.len() + muscles.len());
    for link in constraints.iter().chain(muscles.iter().map(|m| &m.link)) {
        if !seen.insert(link.id) {
            return Err(TopologyError::DuplicateLinkId(link.id));
        }
        validate_link(index, link)?;
    }
    for m in muscles {
        let valid = m.base_length.is_finite()
            && m.base_length >= 0.0
            && (0.0..=1.0).contains(&m.amplitude)
            && m.frequency.is_finite()
            && m.frequency > 0.0
            && m.phase.is_finite();
        if !valid {
            return Err(TopologyError::InvalidLink(m.id()));
        }
    }
    Ok(())
}

fn validate_connected(
    index: &ParticleIndex,
    constraints: &[Constraint],
    muscles: &[Muscle],
) -> Result<(), TopologyError> {
    let total = index.len();
    let mut adjacency = vec![Vec::new(); total];
    for link in constraints.iter().chain(muscles.iter().map(|m| &m.link)) {
        // Endpoints were resolved by validate_links.
        if let (Some(a), Some(b)) = (index.get(link.p1_id), index.get(link.p2_id)) {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
    }

    let mut visited = vec![false; total];
    let mut queue = VecDeque::from([0usize]);
    visited[0] = true;
    let mut reachable = 1;
    while let Some(slot) = queue.pop_front() {
        for &next in &adjacency[slot] {
            if !visited[next] {
                visited[next] = true;
                reachable += 1;
                queue.push_back(next);
            }
        }
    }
    if reachable != total {
        return Err(TopologyError::Disconnected { reachable, total });
    }
    Ok(())
}

fn default_head_slot(particles: &[Particle]) -> usize {
    let mut best = 0;
    for (slot, p) in particles.iter().enumerate() {
        if p.pos.y < particles[best].pos.y {
            best = slot;
        }
    }
    best
}

fn default_foot_slots(particles: &[Particle]) -> Vec<usize> {
    let mut slots: Vec<usize> = (0..particles.len()).collect();
    // Stable sort keeps declaration order among equal heights.
    slots.sort_by(|&a, &b| particles[b].pos.y.total_cmp(&particles[a].pos.y));
    slots.truncate(2);
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_particles() -> Vec<Particle> {
        vec![
            Particle::new(0, Vec2::new(0.0, 0.0), 1.0, 1.0),
            Particle::new(1, Vec2::new(10.0, 0.0), 1.0, 1.0),
        ]
    }

    fn muscle(id: ConstraintId, a: ParticleId, b: ParticleId) -> Muscle {
        Muscle::new(Constraint::new(id, a, b, 10.0), 0.1, 1.0, 0.0)
    }

    #[test]
    fn biped_is_valid_and_roles_resolve() {
        let t = Topology::biped();
        assert_eq!(t.particle_count(), 9);
        assert_eq!(t.muscle_count(), 4);
        assert_eq!(t.head().id, 0);
        assert_eq!(t.feet().map(|p| p.id).collect::<Vec<_>>(), vec![6, 8]);
    }

    #[test]
    fn rejects_duplicate_particle_ids() {
        let mut particles = two_particles();
        particles[1].id = 0;
        let err = Topology::new(particles, vec![], vec![muscle(0, 0, 1)], None, None).unwrap_err();
        assert_eq!(err, TopologyError::DuplicateParticleId(0));
    }

    #[test]
    fn rejects_dangling_reference() {
        let err =
            Topology::new(two_particles(), vec![], vec![muscle(0, 0, 9)], None, None).unwrap_err();
        assert_eq!(
            err,
            TopologyError::DanglingReference {
                link: 0,
                particle: 9
            }
        );
    }

    #[test]
    fn rejects_self_loop() {
        let err =
            Topology::new(two_particles(), vec![], vec![muscle(0, 1, 1)], None, None).unwrap_err();
        assert_eq!(err, TopologyError::SelfLoop(0));
    }

    #[test]
    fn rejects_disconnected_graph() {
        let mut particles = two_particles();
        particles.push(Particle::new(2, Vec2::new(50.0, 0.0), 1.0, 1.0));
        let err = Topology::new(particles, vec![], vec![muscle(0, 0, 1)], None, None).unwrap_err();
        assert_eq!(
            err,
            TopologyError::Disconnected {
                reachable: 2,
                total: 3
            }
        );
    }

    #[test]
    fn rejects_missing_muscles_and_duplicate_link_ids() {
        let bones = vec![Constraint::new(0, 0, 1, 10.0)];
        assert_eq!(
            Topology::new(two_particles(), bones.clone(), vec![], None, None).unwrap_err(),
            TopologyError::NoMuscles
        );
        assert_eq!(
            Topology::new(two_particles(), bones, vec![muscle(0, 0, 1)], None, None).unwrap_err(),
            TopologyError::DuplicateLinkId(0)
        );
    }

    #[test]
    fn json_round_trip_preserves_structure() {
        let t = Topology::biped();
        let json = serde_json::to_string(&t).expect("topology serializes");
        let back = Topology::from_json(&json).expect("topology parses");
        assert_eq!(back.particles(), t.particles());
        assert_eq!(back.constraints(), t.constraints());
        assert_eq!(back.muscles(), t.muscles());
        assert_eq!(back.head_slot(), t.head_slot());
        assert_eq!(back.foot_slots(), t.foot_slots());
    }

    #[test]
    fn json_validation_runs_on_load() {
        let json = r#"{
            "particles": [{"id": 0, "pos": {"x": 0.0, "y": 0.0}, "mass": 1.0, "radius": 1.0}],
            "muscles": [{"id": 0, "p1_id": 0, "p2_id": 4, "rest_length": 1.0, "stiffness": 1.0}]
        }"#;
        let err = Topology::from_json(json).unwrap_err();
        assert!(err.to_string().contains("not declared"));
    }
}
