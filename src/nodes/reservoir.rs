use crate::config::ReservoirConfig;
use crate::nodes::curve::Curve;
use crate::nodes::season::SeasonalFlow;
use crate::nodes::types::{HydroNode, NodeId, NodeKind, SECONDS_PER_HOUR, m3s_to_mm3, mm3_to_m3s};

/// Bottom outlet whose flow follows the reservoir's action.
#[derive(Debug, Clone, PartialEq)]
pub struct Hatch {
    pub to: Option<NodeId>,
    pub min_flow_m3s: f64,
    pub max_flow_m3s: f64,
    pub sill_masl: f64,
}

impl Hatch {
    /// Flow requested at action `a` ∈ [0, 1].
    pub fn requested_flow(&self, action: f64) -> f64 {
        self.min_flow_m3s + action * (self.max_flow_m3s - self.min_flow_m3s)
    }

    /// Action that would request `flow_m3s`.
    pub fn action_for_flow(&self, flow_m3s: f64) -> f64 {
        let span = self.max_flow_m3s - self.min_flow_m3s;
        if span <= 0.0 {
            return 0.0;
        }
        ((flow_m3s - self.min_flow_m3s) / span).clamp(0.0, 1.0)
    }
}

/// Mandatory seasonal release outlet.
#[derive(Debug, Clone, PartialEq)]
pub struct MinRelease {
    pub to: Option<NodeId>,
    pub schedule: SeasonalFlow,
}

/// Flows into and requested out of a reservoir for one step (m³/s).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReservoirInput {
    pub inflow_m3s: f64,
    pub tunnel_request_m3s: f64,
    pub hatch_action: f64,
    pub min_release_m3s: f64,
}

/// Outcome of one reservoir step. Flows in m³/s.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReservoirStep {
    /// Level before releases, after inflow (masl).
    pub start_masl: f64,
    /// Level at end of step (masl).
    pub end_masl: f64,
    pub tunnel_m3s: f64,
    pub hatch_m3s: f64,
    /// Hatch action actually applied.
    pub hatch_action: f64,
    pub min_release_m3s: f64,
    /// Overflow plus forced spill.
    pub spill_m3s: f64,
    /// At least one outlet delivered less than requested.
    pub shortage: bool,
    pub tunnel_shortage: bool,
    /// Level fraction at end of step.
    pub fraction: f64,
    pub penalty: f64,
}

impl ReservoirStep {
    pub fn total_release_m3s(&self) -> f64 {
        self.tunnel_m3s + self.hatch_m3s + self.min_release_m3s + self.spill_m3s
    }
}

/// A storage reservoir with up to four outlets: tunnel, hatch, seasonal
/// minimum release, and overflow.
///
/// Storage is tracked in Mm³; the level fraction is measured between the
/// lowest (LRW) and highest (HRW) regulated water levels, so 0.0 is LRW
/// and 1.0 is HRW.
///
/// # Release policy
///
/// Requested releases never draw storage below `min_fraction`. A request
/// that cannot be met is cut to what is available and flagged as a
/// shortage. Water above `max_fraction` after all outlets is spilled.
#[derive(Debug, Clone)]
pub struct Reservoir {
    id: NodeId,
    name: String,
    pub lrw_masl: f64,
    pub hrw_masl: f64,
    volume: Curve,
    overflow: Option<Curve>,
    pub min_fraction: f64,
    pub max_fraction: f64,
    pub initial_fraction: f64,
    pub tunnel: Option<NodeId>,
    pub hatch: Option<Hatch>,
    pub min_release: Option<MinRelease>,
    pub spill_to: Option<NodeId>,
    pub lrw_penalty_per_hour: f64,

    v_lrw: f64,
    v_hrw: f64,

    volume_mm3: f64,
}

impl Reservoir {
    /// Builds a reservoir from its configuration.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid parameter.
    pub fn from_config(cfg: &ReservoirConfig) -> Result<Self, String> {
        let volume =
            Curve::monotonic(&cfg.volume_curve).map_err(|e| format!("volume_curve: {e}"))?;
        if !(cfg.lrw_masl < cfg.hrw_masl) {
            return Err("lrw_masl must be below hrw_masl".to_string());
        }
        if cfg.lrw_masl < volume.x_min() || cfg.hrw_masl > volume.x_max() {
            return Err(format!(
                "volume_curve must cover {}..{} masl",
                cfg.lrw_masl, cfg.hrw_masl
            ));
        }
        if !(cfg.min_fraction < cfg.max_fraction) {
            return Err("min_fraction must be below max_fraction".to_string());
        }
        if !(cfg.min_fraction..=cfg.max_fraction).contains(&cfg.initial_fraction) {
            return Err(format!(
                "initial_fraction {} outside [{}, {}]",
                cfg.initial_fraction, cfg.min_fraction, cfg.max_fraction
            ));
        }
        let overflow = if cfg.overflow_curve.is_empty() {
            None
        } else {
            Some(Curve::new(&cfg.overflow_curve).map_err(|e| format!("overflow_curve: {e}"))?)
        };
        let hatch = match &cfg.hatch {
            Some(h) => {
                if h.min_flow_m3s < 0.0 || h.max_flow_m3s < h.min_flow_m3s {
                    return Err("hatch flows must satisfy 0 <= min_flow <= max_flow".to_string());
                }
                Some(Hatch {
                    to: h.to,
                    min_flow_m3s: h.min_flow_m3s,
                    max_flow_m3s: h.max_flow_m3s,
                    sill_masl: h.sill_masl,
                })
            }
            None => None,
        };
        let min_release = match &cfg.min_release {
            Some(m) => Some(MinRelease {
                to: m.to,
                schedule: SeasonalFlow::from_config(&m.periods)
                    .map_err(|e| format!("min_release: {e}"))?,
            }),
            None => None,
        };
        if cfg.lrw_penalty_per_hour < 0.0 {
            return Err("lrw_penalty_per_hour must be >= 0".to_string());
        }

        let v_lrw = volume.eval(cfg.lrw_masl);
        let v_hrw = volume.eval(cfg.hrw_masl);
        let reservoir = Self {
            id: cfg.id,
            name: cfg.name.clone(),
            lrw_masl: cfg.lrw_masl,
            hrw_masl: cfg.hrw_masl,
            volume,
            overflow,
            min_fraction: cfg.min_fraction,
            max_fraction: cfg.max_fraction,
            initial_fraction: cfg.initial_fraction,
            tunnel: cfg.tunnel,
            hatch,
            min_release,
            spill_to: cfg.spill_to,
            lrw_penalty_per_hour: cfg.lrw_penalty_per_hour,
            v_lrw,
            v_hrw,
            volume_mm3: 0.0,
        };
        let (floor, ceiling) = (reservoir.floor_mm3(), reservoir.ceiling_mm3());
        if floor < reservoir.volume.y_min() || ceiling > reservoir.volume.y_max() {
            return Err("min/max fraction reach beyond volume_curve".to_string());
        }
        Ok(reservoir)
    }

    /// Storage at a level fraction (Mm³).
    pub fn volume_at_fraction(&self, fraction: f64) -> f64 {
        self.v_lrw + fraction * (self.v_hrw - self.v_lrw)
    }

    /// Level fraction of a storage volume.
    pub fn fraction_of(&self, volume_mm3: f64) -> f64 {
        (volume_mm3 - self.v_lrw) / (self.v_hrw - self.v_lrw)
    }

    pub fn masl_of(&self, volume_mm3: f64) -> f64 {
        self.volume.inverse(volume_mm3)
    }

    pub fn floor_mm3(&self) -> f64 {
        self.volume_at_fraction(self.min_fraction)
    }

    pub fn ceiling_mm3(&self) -> f64 {
        self.volume_at_fraction(self.max_fraction)
    }

    /// Regulated storage between LRW and HRW (Mm³).
    pub fn regulated_mm3(&self) -> f64 {
        self.v_hrw - self.v_lrw
    }

    /// Current level fraction.
    pub fn fraction(&self) -> f64 {
        self.fraction_of(self.volume_mm3)
    }

    /// Mean of LRW and HRW, used as nominal intake level.
    pub fn mean_masl(&self) -> f64 {
        0.5 * (self.lrw_masl + self.hrw_masl)
    }

    /// Restores storage to `fraction`, clamped to the allowed range.
    pub fn reset(&mut self, fraction: f64) {
        let fraction = fraction.clamp(self.min_fraction, self.max_fraction);
        self.volume_mm3 = self.volume_at_fraction(fraction);
    }

    /// Advances storage by one step.
    ///
    /// Order: inflow, tunnel, hatch, seasonal release, overflow, forced
    /// spill. Each outlet sees the storage left by the previous one.
    pub fn step(&mut self, input: &ReservoirInput, dt_s: f64) -> ReservoirStep {
        let floor = self.floor_mm3();
        let available = |v: f64, limit: f64| mm3_to_m3s((v - limit).max(0.0), dt_s);
        let mut out = ReservoirStep::default();

        let mut v = self.volume_mm3 + m3s_to_mm3(input.inflow_m3s.max(0.0), dt_s);
        out.start_masl = self.masl_of(v);

        // Tunnel
        let request = input.tunnel_request_m3s.max(0.0);
        let limit = available(v, floor);
        out.tunnel_m3s = request.min(limit);
        out.tunnel_shortage = request > limit;
        v -= m3s_to_mm3(out.tunnel_m3s, dt_s);

        // Hatch
        if let Some(hatch) = &self.hatch {
            let action = input.hatch_action.clamp(0.0, 1.0);
            let request = hatch.requested_flow(action);
            let sill = self.volume.eval(hatch.sill_masl).max(floor);
            let limit = if self.masl_of(v) > hatch.sill_masl {
                available(v, sill)
            } else {
                0.0
            };
            if request > limit {
                out.hatch_m3s = limit;
                out.hatch_action = hatch.action_for_flow(limit);
                out.shortage = true;
            } else {
                out.hatch_m3s = request;
                out.hatch_action = action;
            }
            v -= m3s_to_mm3(out.hatch_m3s, dt_s);
        }

        // Seasonal minimum release
        let request = input.min_release_m3s.max(0.0);
        if request > 0.0 {
            let limit = available(v, floor);
            out.min_release_m3s = request.min(limit);
            out.shortage |= request > limit;
            v -= m3s_to_mm3(out.min_release_m3s, dt_s);
        }

        // Overflow, never below the crest or the floor
        if let Some(curve) = &self.overflow {
            if self.masl_of(v) > curve.x_min() {
                let crest = self.volume.eval(curve.x_min()).max(floor);
                let q = curve.eval(self.masl_of(v)).max(0.0).min(available(v, crest));
                out.spill_m3s += q;
                v -= m3s_to_mm3(q, dt_s);
            }
        }

        // Forced spill above the ceiling
        let ceiling = self.ceiling_mm3();
        if v > ceiling {
            out.spill_m3s += mm3_to_m3s(v - ceiling, dt_s);
            v = ceiling;
        }

        out.shortage |= out.tunnel_shortage;
        self.volume_mm3 = v;
        out.end_masl = self.masl_of(v);
        out.fraction = self
            .fraction_of(v)
            .clamp(self.min_fraction, self.max_fraction);
        if out.fraction < 0.0 {
            out.penalty = self.lrw_penalty_per_hour * dt_s / SECONDS_PER_HOUR;
        }
        out
    }
}

impl HydroNode for Reservoir {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Reservoir
    }

    fn storage_mm3(&self) -> f64 {
        self.volume_mm3
    }

    /// Water above LRW. Storage drawn below LRW counts as nothing left.
    fn remaining_mm3(&self) -> f64 {
        (self.volume_mm3 - self.v_lrw).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HatchConfig;

    const DT: f64 = 3600.0;

    fn lake() -> Reservoir {
        let cfg = ReservoirConfig {
            id: 0,
            name: "Lake".to_string(),
            lrw_masl: 100.0,
            hrw_masl: 110.0,
            volume_curve: vec![[90.0, 0.0], [100.0, 1.0], [110.0, 11.0], [120.0, 21.0]],
            initial_fraction: 0.5,
            overflow_curve: vec![[110.0, 0.0], [111.0, 100.0]],
            ..ReservoirConfig::default()
        };
        let mut r = Reservoir::from_config(&cfg).unwrap();
        r.reset(0.5);
        r
    }

    fn with_hatch(mut r: Reservoir) -> Reservoir {
        r.hatch = Some(Hatch {
            to: None,
            min_flow_m3s: 1.0,
            max_flow_m3s: 11.0,
            sill_masl: 104.0,
        });
        r
    }

    #[test]
    fn derived_volumes() {
        let r = lake();
        assert_eq!(r.floor_mm3(), 1.0);
        assert_eq!(r.ceiling_mm3(), 11.0);
        assert_eq!(r.storage_mm3(), 6.0);
        assert!((r.masl_of(6.0) - 105.0).abs() < 1e-12);
    }

    #[test]
    fn remaining_water_is_measured_from_lrw() {
        let mut r = lake();
        assert_eq!(r.remaining_mm3(), 5.0);
        r.min_fraction = -0.1;
        r.reset(-0.05);
        assert!(r.storage_mm3() < r.volume_at_fraction(0.0));
        assert_eq!(r.remaining_mm3(), 0.0);
    }

    #[test]
    fn inflow_raises_level() {
        let mut r = lake();
        let input = ReservoirInput {
            inflow_m3s: 100.0,
            ..ReservoirInput::default()
        };
        let out = r.step(&input, DT);
        // 100 m³/s for an hour is 0.36 Mm³ on a 10 Mm³ regulated range
        assert!((out.fraction - 0.536).abs() < 1e-12);
        assert!(!out.shortage);
        assert_eq!(out.total_release_m3s(), 0.0);
    }

    #[test]
    fn tunnel_release_is_clamped_to_floor() {
        let mut r = lake();
        r.reset(0.0001);
        let input = ReservoirInput {
            tunnel_request_m3s: 50.0,
            ..ReservoirInput::default()
        };
        let out = r.step(&input, DT);
        assert!(out.tunnel_shortage);
        assert!(out.shortage);
        // 0.001 Mm³ above floor over an hour
        assert!((out.tunnel_m3s - 0.001 * 1e6 / DT).abs() < 1e-9);
        assert!(out.fraction >= r.min_fraction);
    }

    #[test]
    fn spill_keeps_level_at_max() {
        let mut r = lake();
        r.overflow = None;
        r.reset(0.99);
        let input = ReservoirInput {
            inflow_m3s: 1000.0,
            ..ReservoirInput::default()
        };
        let out = r.step(&input, DT);
        assert_eq!(out.fraction, 1.0);
        // 10.9 + 3.6 Mm³ arrives, 11.0 Mm³ fits
        assert!((out.spill_m3s - mm3_to_m3s(3.5, DT)).abs() < 1e-6);
    }

    #[test]
    fn overflow_curve_drains_above_crest() {
        let mut r = lake();
        r.reset(1.0);
        let input = ReservoirInput {
            inflow_m3s: 200.0,
            ..ReservoirInput::default()
        };
        let out = r.step(&input, DT);
        assert!(out.spill_m3s > 0.0);
        assert!(out.fraction <= 1.0);
    }

    #[test]
    fn hatch_follows_action() {
        let mut r = with_hatch(lake());
        let input = ReservoirInput {
            hatch_action: 0.5,
            ..ReservoirInput::default()
        };
        let out = r.step(&input, DT);
        assert_eq!(out.hatch_m3s, 6.0);
        assert_eq!(out.hatch_action, 0.5);
        assert!(!out.shortage);
    }

    #[test]
    fn hatch_runs_dry_below_sill() {
        let mut r = with_hatch(lake());
        r.reset(0.2); // 102 masl, sill at 104
        let input = ReservoirInput {
            hatch_action: 1.0,
            ..ReservoirInput::default()
        };
        let out = r.step(&input, DT);
        assert_eq!(out.hatch_m3s, 0.0);
        assert_eq!(out.hatch_action, 0.0);
        assert!(out.shortage);
    }

    #[test]
    fn lrw_penalty_below_zero_fraction() {
        let cfg = ReservoirConfig {
            id: 0,
            name: "Deep".to_string(),
            lrw_masl: 100.0,
            hrw_masl: 110.0,
            volume_curve: vec![[90.0, 0.0], [100.0, 1.0], [110.0, 11.0]],
            initial_fraction: -0.05,
            min_fraction: -0.1,
            lrw_penalty_per_hour: 500.0,
            ..ReservoirConfig::default()
        };
        let mut r = Reservoir::from_config(&cfg).unwrap();
        r.reset(-0.05);
        let out = r.step(&ReservoirInput::default(), 1800.0);
        assert_eq!(out.penalty, 250.0);
    }

    #[test]
    fn rejects_inverted_levels() {
        let cfg = ReservoirConfig {
            lrw_masl: 110.0,
            hrw_masl: 100.0,
            volume_curve: vec![[90.0, 0.0], [120.0, 21.0]],
            ..ReservoirConfig::default()
        };
        assert!(Reservoir::from_config(&cfg).is_err());
    }

    #[test]
    fn rejects_bad_hatch() {
        let cfg = ReservoirConfig {
            lrw_masl: 100.0,
            hrw_masl: 110.0,
            volume_curve: vec![[90.0, 0.0], [120.0, 21.0]],
            hatch: Some(HatchConfig {
                min_flow_m3s: 5.0,
                max_flow_m3s: 1.0,
                ..HatchConfig::default()
            }),
            ..ReservoirConfig::default()
        };
        assert!(Reservoir::from_config(&cfg).is_err());
    }

    #[test]
    fn hatch_action_inverse() {
        let h = Hatch {
            to: None,
            min_flow_m3s: 1.0,
            max_flow_m3s: 11.0,
            sill_masl: 0.0,
        };
        assert!((h.action_for_flow(h.requested_flow(0.3)) - 0.3).abs() < 1e-12);
        assert_eq!(h.action_for_flow(0.5), 0.0);
    }
}
