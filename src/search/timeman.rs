//! Time management: turning clock state into an optimum and a maximum
//! budget for the move about to be searched.
//!
//! Supports `x basetime (+ z increment)` and `x moves in y seconds
//! (+ z increment)`, plus a nodes-as-time mode where the "clock" is a
//! node budget, for reproducible time control in testing.

use std::time::Instant;

use cozy_chess::Color;

/// Milliseconds (or nodes, in nodes-as-time mode).
pub type TimePoint = i64;

/// Clock state for the side to move, as parsed from the host protocol.
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub time: [TimePoint; 2],
    pub inc: [TimePoint; 2],
    /// 0 means sudden death.
    pub movestogo: i32,
    pub start_time: Instant,
}

impl Limits {
    pub fn new() -> Self {
        Self { time: [0; 2], inc: [0; 2], movestogo: 0, start_time: Instant::now() }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}

/// The options the time manager reads from the host.
#[derive(Clone, Copy, Debug)]
pub struct EngineOptions {
    /// Milliseconds reserved per move for I/O latency.
    pub move_overhead: TimePoint,
    /// Nodes per millisecond; 0 disables nodes-as-time mode.
    pub nodestime: TimePoint,
    pub ponder: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { move_overhead: 10, nodestime: 0, ponder: false }
    }
}

/// Tunable integer constants of the allocation formulas. Every value is
/// a scaled integer; the comment gives the effective scale. `mtg_base`
/// tunes in 1000..10000 and `maximum_time_clamp_coeff` in
/// 805000..855000.
#[derive(Clone, Copy, Debug)]
pub struct TimeParams {
    /// Default move horizon in centimoves.
    pub mtg_base: i32,
    /// /1e4, coefficient of log10(timeLeft).
    pub ota_coeff: i32,
    /// /1e4, constant subtracted from the time adjustment.
    pub ota_constant: i32,
    /// /1e8
    pub opt_base: i32,
    /// /1e9
    pub opt_coeff: i32,
    /// /1e8
    pub opt_max: i32,
    /// /1e5
    pub max_constant_constant: i32,
    /// /1e5
    pub max_constant_coeff: i32,
    /// /1e5
    pub max_constant_min: i32,
    /// /1e7
    pub opt_scale_constant: i32,
    /// /1e5
    pub opt_scale_pow_base: i32,
    /// /1e6
    pub opt_scale_pow_exponent: i32,
    /// /1e6
    pub opt_scale_max_coeff: i32,
    /// /1e5
    pub max_scale_maximum: i32,
    /// /1e4
    pub max_scale_divisor: i32,
    /// /1e6
    pub maximum_time_clamp_coeff: i32,
}

impl Default for TimeParams {
    fn default() -> Self {
        Self {
            mtg_base: 5051,
            ota_coeff: 3128,
            ota_constant: 4354,
            opt_base: 321160,
            opt_coeff: 321123,
            opt_max: 508017,
            max_constant_constant: 339770,
            max_constant_coeff: 303950,
            max_constant_min: 294761,
            opt_scale_constant: 121431,
            opt_scale_pow_base: 294693,
            opt_scale_pow_exponent: 461073,
            opt_scale_max_coeff: 213035,
            max_scale_maximum: 667704,
            max_scale_divisor: 119847,
            maximum_time_clamp_coeff: 825178,
        }
    }
}

pub struct TimeManager {
    start_time: Instant,
    optimum_time: TimePoint,
    maximum_time: TimePoint,
    /// -1 while uninitialized; only meaningful in nodes-as-time mode.
    available_nodes: i64,
    use_nodes_time: bool,
}

impl TimeManager {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            optimum_time: 0,
            maximum_time: 0,
            available_nodes: -1,
            use_nodes_time: false,
        }
    }

    pub fn optimum(&self) -> TimePoint {
        self.optimum_time
    }

    pub fn maximum(&self) -> TimePoint {
        self.maximum_time
    }

    pub fn use_nodes_time(&self) -> bool {
        self.use_nodes_time
    }

    pub fn available_nodes(&self) -> i64 {
        self.available_nodes
    }

    /// Wall-clock milliseconds since the search started.
    pub fn elapsed_ms(&self) -> TimePoint {
        self.start_time.elapsed().as_millis() as TimePoint
    }

    /// Resets the nodes-as-time state; called once per new game.
    pub fn clear(&mut self) {
        self.available_nodes = -1;
    }

    /// Books searched nodes against the budget, never below zero.
    pub fn advance_nodes_time(&mut self, nodes: i64) {
        debug_assert!(self.use_nodes_time);
        self.available_nodes = (self.available_nodes - nodes).max(0);
    }

    /// Computes the time bounds for the current game ply. Mirrors the
    /// host's `go` parameters; `original_time_adjust` persists across
    /// calls within one game (negative means uncomputed).
    pub fn init(
        &mut self,
        limits: &mut Limits,
        us: Color,
        ply: i32,
        options: &EngineOptions,
        original_time_adjust: &mut f64,
        params: &TimeParams,
    ) {
        let npmsec = options.nodestime;

        // Even with no clock, startTime feeds elapsed() and the mode flag
        // feeds the driver's node accounting.
        self.start_time = limits.start_time;
        self.use_nodes_time = npmsec != 0;

        let u = us as usize;
        if limits.time[u] == 0 {
            return;
        }

        let mut move_overhead = options.move_overhead;

        // In nodes-as-time mode the clock is converted to nodes once per
        // game, and every formula below runs in node units.
        if self.use_nodes_time {
            if self.available_nodes == -1 {
                self.available_nodes = npmsec * limits.time[u];
            }
            limits.time[u] = self.available_nodes;
            limits.inc[u] *= npmsec;
            move_overhead *= npmsec;
        }

        let scale_factor: i64 = if self.use_nodes_time { npmsec } else { 1 };
        let scaled_time = limits.time[u] / scale_factor;
        let scaled_inc = limits.inc[u] / scale_factor;

        // Maximum move horizon of 50 moves.
        let mut centi_mtg: i64 = if limits.movestogo > 0 {
            i64::from(limits.movestogo.min(50)) * 100
        } else {
            i64::from(params.mtg_base)
        };

        // If less than one second, gradually reduce the horizon.
        if scaled_time < 1000
            && centi_mtg as f64 / scaled_inc as f64 > f64::from(params.mtg_base) / 1000.0
        {
            centi_mtg = (scaled_time as f64 * f64::from(params.mtg_base) / 1000.0) as i64;
        }

        // timeLeft may be used as a divisor below.
        let time_left: i64 = 1.max(
            limits.time[u]
                + (limits.inc[u] * (centi_mtg - 100) - move_overhead * (centi_mtg + 200)) / 100,
        );

        let opt_scale: f64;
        let max_scale: f64;

        if limits.movestogo == 0 {
            // x basetime (+ z increment). With a healthy increment
            // timeLeft can exceed the clock, so optScale is also capped
            // against the actual remaining time.
            if *original_time_adjust < 0.0 {
                *original_time_adjust = f64::from(params.ota_coeff) / 1e4
                    * (time_left as f64).log10()
                    - f64::from(params.ota_constant) / 1e4;
            }

            let log_time_in_sec = (scaled_time as f64 / 1000.0).log10();
            let opt_constant = (f64::from(params.opt_base) / 1e8
                + f64::from(params.opt_coeff) / 1e9 * log_time_in_sec)
                .min(f64::from(params.opt_max) / 1e8);
            let max_constant = (f64::from(params.max_constant_constant) / 1e5
                + f64::from(params.max_constant_coeff) * log_time_in_sec / 1e5)
                .max(f64::from(params.max_constant_min) / 1e5);

            opt_scale = (f64::from(params.opt_scale_constant) / 1e7
                + (f64::from(ply) + f64::from(params.opt_scale_pow_base) / 1e5)
                    .powf(f64::from(params.opt_scale_pow_exponent) / 1e6)
                    * opt_constant)
                .min(
                    f64::from(params.opt_scale_max_coeff) / 1e6 * limits.time[u] as f64
                        / time_left as f64,
                )
                * *original_time_adjust;

            max_scale = (f64::from(params.max_scale_maximum) / 1e5)
                .min(max_constant + f64::from(ply) / (f64::from(params.max_scale_divisor) / 1e4));
        } else {
            // x moves in y seconds (+ z increment).
            let mtg = centi_mtg as f64 / 100.0;
            opt_scale = ((0.88 + f64::from(ply) / 116.4) / mtg)
                .min(0.88 * limits.time[u] as f64 / time_left as f64);
            max_scale = 1.3 + 0.11 * mtg;
        }

        self.optimum_time = (opt_scale * time_left as f64) as TimePoint;
        self.maximum_time = (f64::from(params.maximum_time_clamp_coeff) / 1e6
            * limits.time[u] as f64
            - move_overhead as f64)
            .min(max_scale * self.optimum_time as f64) as TimePoint
            - 10;

        if options.ponder {
            self.optimum_time += self.optimum_time / 4;
        }
    }
}

impl Default for TimeManager {
    fn default() -> Self {
        Self::new()
    }
}
