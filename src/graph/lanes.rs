//! Lane and color allocation for branch traces.

use super::snapshot::TraceId;

/// Hands out lanes (columns) and palette colors to open traces and takes
/// them back when traces close.
///
/// Lanes are reused greedily: a preferred lane if it is free, otherwise the
/// lowest free one. Colors follow a ring over the palette: the smallest color
/// no open trace holds, or once every color is held, the one shared by the
/// fewest traces, released longest ago.
#[derive(Clone, Debug)]
pub struct LaneAllocator {
    /// Which trace occupies each lane, if any
    lanes: Vec<Option<TraceId>>,
    /// Number of open traces holding each color
    holders: Vec<usize>,
    /// Tick at which each color was last released
    released: Vec<Option<u64>>,
    tick: u64,
}

impl LaneAllocator {
    pub fn new(palette_size: usize) -> Self {
        let palette_size = palette_size.max(1);
        Self {
            lanes: Vec::new(),
            holders: vec![0; palette_size],
            released: vec![None; palette_size],
            tick: 0,
        }
    }

    /// Start a trace. Returns `(lane, color)`.
    pub fn open(
        &mut self,
        trace: TraceId,
        preceding_lane: Option<usize>,
        preferred_color: Option<usize>,
    ) -> (usize, usize) {
        let lane = self.claim_lane(trace, preceding_lane);
        let color = self.claim_color(preferred_color);
        (lane, color)
    }

    /// Give `trace` a lane: `preceding_lane` if it is free, otherwise the
    /// lowest free one.
    pub fn claim_lane(&mut self, trace: TraceId, preceding_lane: Option<usize>) -> usize {
        let lane = match preceding_lane {
            Some(lane) if self.is_free(lane) => lane,
            _ => self.lowest_free_lane(),
        };
        self.lanes[lane] = Some(trace);
        lane
    }

    /// Hand out a color without a lane, for traces that settle later.
    pub fn claim_color(&mut self, preferred: Option<usize>) -> usize {
        let color = self.pick_color(preferred);
        self.holders[color] += 1;
        color
    }

    /// A trace passes through another commit; its lane stays put.
    pub fn continue_trace(&self, trace: TraceId, lane: usize) {
        debug_assert_eq!(
            self.lanes.get(lane).copied().flatten(),
            Some(trace),
            "trace {trace} continued through lane {lane} it does not own"
        );
    }

    /// End a trace. The lane is free immediately; the color once no other
    /// open trace still holds it. `lane` is `None` for a trace that never
    /// settled into one.
    pub fn close(&mut self, trace: TraceId, lane: Option<usize>, color: usize) {
        if let Some(slot) = lane.and_then(|lane| self.lanes.get_mut(lane))
            && *slot == Some(trace)
        {
            *slot = None;
        }
        if let Some(count) = self.holders.get_mut(color) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.released[color] = Some(self.tick);
                self.tick += 1;
            }
        }
    }

    pub fn is_free(&self, lane: usize) -> bool {
        self.lanes.get(lane).is_some_and(Option::is_none)
    }

    /// Lanes ever allocated: the peak number of simultaneously open traces.
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn occupied(&self) -> usize {
        self.lanes.iter().filter(|l| l.is_some()).count()
    }

    fn lowest_free_lane(&mut self) -> usize {
        if let Some(lane) = self.lanes.iter().position(Option::is_none) {
            return lane;
        }
        self.lanes.push(None);
        self.lanes.len() - 1
    }

    fn pick_color(&self, preferred: Option<usize>) -> usize {
        if let Some(color) = preferred
            && self.holders.get(color) == Some(&0)
        {
            return color;
        }
        if let Some(color) = self.holders.iter().position(|&count| count == 0) {
            return color;
        }

        // Every color is in use: wrap around and share the least crowded,
        // longest released one. Never-released colors count as oldest.
        (0..self.holders.len())
            .min_by_key(|&color| {
                let released = self.released[color].map_or(0, |tick| tick + 1);
                (self.holders[color], released, color)
            })
            .unwrap_or(0)
    }
}
