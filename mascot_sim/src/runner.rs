// mascot_sim/src/runner.rs

//! The closed loop: plan, move, sample, assimilate, record.

use mascot_core::belief::{PriorMean, SpatialBeliefField};
use mascot_core::fields::information::expected_ibv;
use mascot_core::interfaces::GroundTruthProvider;
use mascot_core::pipeline::{update_belief, CyclePlanner};
use mascot_core::planning::PlanningError;
use mascot_core::types::Location;
use mascot_core::vehicle::VehicleState;
use nalgebra::DVector;
use tracing::{debug, info, warn};

use crate::config::MissionConfig;
use crate::error::SimError;
use crate::ground_truth::GaussianFieldTruth;
use crate::prng::SimulationRng;

/// How the waypoint of a cycle was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointSource {
    /// RRT* through the full cost valley.
    Informative,
    /// RRT* over obstacles only, after the budget ran short.
    Homing,
    /// Cheapest neighbouring grid point, after RRT* failed.
    Greedy,
    /// One step straight at the goal, when nothing else worked and the
    /// straight segment is clear.
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionStatus {
    Running,
    Arrived,
    BudgetExhausted,
    /// No planner, fallback or straight step could move the vehicle safely.
    Stuck,
    StepLimitReached,
}

/// Per-cycle record of the mission, kept in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissionMetrics {
    /// Start location first, then every visited waypoint.
    pub trajectory: Vec<Location>,
    pub sources: Vec<WaypointSource>,
    pub measurements: Vec<f64>,
    /// Expected IBV of each sample, evaluated on the belief before it was taken.
    pub eibv: Vec<f64>,
    /// Belief RMSE against the truth, when the truth is known.
    pub rmse: Vec<f64>,
    pub total_variance: Vec<f64>,
    pub ibv: Vec<f64>,
    pub distance_travelled: f64,
}

pub struct MissionRunner<T: GroundTruthProvider> {
    planner: CyclePlanner,
    belief: SpatialBeliefField,
    vehicle: VehicleState,
    truth: T,
    rng: SimulationRng,
    time: f64,
    time_step: f64,
    max_steps: usize,
    arrival_radius: f64,
    steps: usize,
    stuck: bool,
    metrics: MissionMetrics,
}

impl MissionRunner<GaussianFieldTruth> {
    /// Builds the grid, prior belief, synthetic truth and planner described
    /// by `config`.
    pub fn from_config(config: &MissionConfig, mut rng: SimulationRng) -> Result<Self, SimError> {
        let area = config.operational_area();
        let grid = config.grid(&area)?;
        let kernel = config.kernel();
        let prior_mean = DVector::from_element(grid.len(), config.field.prior_mean);

        let truth = GaussianFieldTruth::draw(
            grid.clone(),
            prior_mean.clone(),
            kernel.as_ref(),
            config.field.nugget,
            config.field.ar1_correlation,
            config.simulation.time_step,
            rng.fork(),
        )?;
        let belief = SpatialBeliefField::initialize(
            &grid,
            PriorMean::Field(prior_mean),
            kernel,
            config.field.nugget,
        )?;
        let planner = CyclePlanner::new(
            grid,
            area,
            config.field.threshold,
            config.constraints,
            config.planner.clone(),
        )?;
        let vehicle = VehicleState::new(config.start(), config.goal(), config.mission.budget);
        info!(
            locations = planner.grid().len(),
            start = %vehicle.current,
            goal = %vehicle.goal,
            budget = vehicle.budget,
            "Mission set up"
        );

        Ok(Self::new(
            planner,
            belief,
            vehicle,
            truth,
            rng,
            config.simulation.time_step,
            config.simulation.max_steps,
            config.mission.arrival_radius,
        ))
    }
}

impl<T: GroundTruthProvider> MissionRunner<T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        planner: CyclePlanner,
        belief: SpatialBeliefField,
        vehicle: VehicleState,
        truth: T,
        rng: SimulationRng,
        time_step: f64,
        max_steps: usize,
        arrival_radius: f64,
    ) -> Self {
        let mut runner = Self {
            planner,
            belief,
            vehicle,
            truth,
            rng,
            time: 0.0,
            time_step,
            max_steps,
            arrival_radius,
            steps: 0,
            stuck: false,
            metrics: MissionMetrics::default(),
        };
        runner.metrics.trajectory.push(runner.vehicle.current);
        runner.record_belief();
        runner
    }

    pub fn belief(&self) -> &SpatialBeliefField {
        &self.belief
    }

    pub fn vehicle(&self) -> &VehicleState {
        &self.vehicle
    }

    pub fn planner(&self) -> &CyclePlanner {
        &self.planner
    }

    pub fn metrics(&self) -> &MissionMetrics {
        &self.metrics
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn status(&self) -> MissionStatus {
        if self.vehicle.has_arrived(self.arrival_radius) {
            MissionStatus::Arrived
        } else if self.vehicle.budget <= 0.0 {
            MissionStatus::BudgetExhausted
        } else if self.stuck {
            MissionStatus::Stuck
        } else if self.steps >= self.max_steps {
            MissionStatus::StepLimitReached
        } else {
            MissionStatus::Running
        }
    }

    /// One full cycle. Does nothing once the mission has stopped.
    pub fn step(&mut self) -> Result<MissionStatus, SimError> {
        let status = self.status();
        if status != MissionStatus::Running {
            return Ok(status);
        }

        let Some((waypoint, source)) = self.next_waypoint()? else {
            warn!(location = %self.vehicle.current, "No safe waypoint left, stopping the mission");
            self.stuck = true;
            return Ok(self.status());
        };
        let travelled = self.vehicle.advance_to(waypoint);
        self.time += self.time_step;
        self.steps += 1;

        let value = self.truth.sample(&waypoint, self.time);
        if let Some(index) = self.planner.grid().nearest_index(&waypoint) {
            let eibv = expected_ibv(&self.belief, self.planner.threshold(), &[index])?;
            self.metrics.eibv.push(eibv);
            update_belief(&mut self.belief, &[index], &[value])?;
        }

        self.metrics.trajectory.push(waypoint);
        self.metrics.sources.push(source);
        self.metrics.measurements.push(value);
        self.metrics.distance_travelled += travelled;
        self.record_belief();
        debug!(
            step = self.steps,
            ?source,
            %waypoint,
            value,
            budget = self.vehicle.budget,
            "Cycle complete"
        );
        Ok(self.status())
    }

    /// Cycles until arrival, budget exhaustion or the step limit.
    pub fn run(&mut self) -> Result<MissionStatus, SimError> {
        let status = loop {
            let status = self.step()?;
            if status != MissionStatus::Running {
                break status;
            }
        };
        info!(
            ?status,
            steps = self.steps,
            distance = self.metrics.distance_travelled,
            total_variance = self.belief.total_variance(),
            rmse = self.metrics.rmse.last().copied(),
            "Mission finished"
        );
        Ok(status)
    }

    /// Planning with the fallback ladder: informative plan, homing plan when
    /// the budget runs short, greedy step when RRT* fails, and finally one
    /// step straight at the goal. `None` when even that step is blocked.
    fn next_waypoint(&mut self) -> Result<Option<(Location, WaypointSource)>, SimError> {
        let direct = |runner: &Self| runner.direct_step().map(|next| (next, WaypointSource::Direct));
        match self
            .planner
            .plan_next_waypoint(&self.belief, &self.vehicle, &mut self.rng.0)
        {
            Ok(plan) => Ok(Some((plan.waypoint, WaypointSource::Informative))),
            Err(PlanningError::ReturnToGoalRequired { budget }) => {
                info!(budget, "Switching to homing");
                match self.planner.plan_return_to_goal(&self.vehicle, &mut self.rng.0) {
                    Ok(plan) => Ok(Some((plan.waypoint, WaypointSource::Homing))),
                    Err(PlanningError::PlanningFailed { .. }) => {
                        warn!("Homing plan failed, heading straight for the goal");
                        Ok(direct(self))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(PlanningError::PlanningFailed { iterations, nodes, .. }) => {
                warn!(iterations, nodes, "RRT* failed, falling back to a greedy step");
                match self.planner.greedy_step(&self.vehicle) {
                    Some(next) => Ok(Some((next, WaypointSource::Greedy))),
                    None => {
                        warn!("No greedy step available, heading straight for the goal");
                        Ok(direct(self))
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// At most one planner step along the straight line to the goal, provided
    /// the segment stays inside the border and clear of obstacles.
    fn direct_step(&self) -> Option<Location> {
        let current = self.vehicle.current;
        let to_goal = self.vehicle.goal - current;
        let distance = to_goal.norm();
        let step = self.planner.rrt_config().step_size;
        let next = if distance <= step {
            self.vehicle.goal
        } else {
            current + to_goal * (step / distance)
        };
        if self.planner.area().is_segment_free(&current, &next) {
            Some(next)
        } else {
            debug!(%current, %next, "Straight step blocked");
            None
        }
    }

    fn record_belief(&mut self) {
        let threshold = self.planner.threshold();
        self.metrics.total_variance.push(self.belief.total_variance());
        self.metrics
            .ibv
            .push(self.belief.integrated_bernoulli_variance(threshold));
        if let Some(truth) = self.truth.field_snapshot() {
            self.metrics.rmse.push(self.belief.rmse_against(&truth));
        }
    }
}
