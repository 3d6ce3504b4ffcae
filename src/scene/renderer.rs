//! Scene renderer: particles, glyphs and flow dots on one canvas.
//!
//! Each tick the renderer
//!
//! 1. moves particles with the frame's real `dt` and their class rules,
//! 2. resolves them against the declared region,
//! 3. relabels (optional) and syncs the pool to the snapshot's targets,
//! 4. advances flow-dot phases,
//! 5. draws everything in view units scaled to fit the canvas.
//!
//! Particle and flow state is visual only. It is dropped whenever the
//! driver's epoch changes (reset or hard restart).

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, SchemaError};
use crate::model::{ModelDeclaration, SceneState};
use crate::render::{Frame, RenderHost, Renderer};
use crate::scene::flow::{FlowPath, FlowPathSpec};
use crate::scene::glyph::{draw_glyph, GlyphSpec};
use crate::scene::motion::{MotionContext, MotionRule, Phase};
use crate::scene::particles::{ParticlePool, ParticleState};
use crate::scene::region::{Boundary, Contact, Region, Shape};
use crate::scene::spawn::{hsv_to_rgb, SpawnContext};
use crate::surface::{Paint, Surface};
use crate::visuals::{Color, Palette};

/// Global alpha applied while the frame is stale.
const STALE_ALPHA: f64 = 0.4;

fn default_radius() -> f32 {
    3.0
}

fn default_view() -> Vec2 {
    Vec2::new(600.0, 400.0)
}

/// Colour-temperature tint read from a scene field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tint {
    pub field: String,
    #[serde(default)]
    pub palette: Palette,
    pub min: f64,
    pub max: f64,
}

impl Tint {
    fn color(&self, scene: &SceneState) -> Option<Color> {
        let v = scene.field(&self.field).filter(|v| v.is_finite())?;
        let span = self.max - self.min;
        let t = if span.abs() > f64::EPSILON {
            (v - self.min) / span
        } else {
            0.0
        };
        Some(self.palette.sample(t as f32))
    }
}

/// One particle class in a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticleClassSpec {
    /// Class name as emitted in `scene.particle_targets`.
    pub name: String,
    #[serde(default)]
    pub color: Option<Color>,
    #[serde(default = "default_radius")]
    pub radius: f32,
    /// Target used when the snapshot names no target for this class.
    #[serde(default)]
    pub count: Option<usize>,
    /// Spawn area; defaults to the scene region.
    #[serde(default)]
    pub spawn: Option<Region>,
    #[serde(default)]
    pub initial_speed: f32,
    #[serde(default)]
    pub rules: Vec<MotionRule>,
    #[serde(default)]
    pub tint: Option<Tint>,
}

impl ParticleClassSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            color: None,
            radius: default_radius(),
            count: None,
            spawn: None,
            initial_speed: 0.0,
            rules: Vec::new(),
            tint: None,
        }
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn spawn_in(mut self, region: Region) -> Self {
        self.spawn = Some(region);
        self
    }

    pub fn speed(mut self, speed: f32) -> Self {
        self.initial_speed = speed;
        self
    }

    pub fn with_rule(mut self, rule: MotionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn tint(mut self, tint: Tint) -> Self {
        self.tint = Some(tint);
        self
    }
}

/// Declarative scene layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSpec {
    pub canvas_id: String,
    /// Logical view size; the canvas is letterboxed to fit.
    #[serde(default = "default_view")]
    pub view: Vec2,
    /// Particle region; defaults to the whole view.
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub boundary: Boundary,
    #[serde(default, rename = "particleClasses")]
    pub classes: Vec<ParticleClassSpec>,
    /// Rebalance classes by relabelling before adding or removing.
    #[serde(default)]
    pub relabel: bool,
    #[serde(default)]
    pub glyphs: Vec<GlyphSpec>,
    #[serde(default)]
    pub flow_paths: Vec<FlowPathSpec>,
    #[serde(default)]
    pub background: Option<Color>,
    #[serde(default)]
    pub show_region: bool,
}

impl SceneSpec {
    pub fn new(canvas_id: &str, view: Vec2) -> Self {
        Self {
            canvas_id: canvas_id.to_string(),
            view,
            region: None,
            boundary: Boundary::default(),
            classes: Vec::new(),
            relabel: false,
            glyphs: Vec::new(),
            flow_paths: Vec::new(),
            background: Some(Color::BACKGROUND),
            show_region: false,
        }
    }

    pub fn region(mut self, region: Region, boundary: Boundary) -> Self {
        self.region = Some(region);
        self.boundary = boundary;
        self
    }

    pub fn class(mut self, class: ParticleClassSpec) -> Self {
        self.classes.push(class);
        self
    }

    pub fn relabel(mut self) -> Self {
        self.relabel = true;
        self
    }

    pub fn glyph(mut self, glyph: GlyphSpec) -> Self {
        self.glyphs.push(glyph);
        self
    }

    pub fn flow(mut self, path: FlowPathSpec) -> Self {
        self.flow_paths.push(path);
        self
    }

    pub fn show_region(mut self) -> Self {
        self.show_region = true;
        self
    }

    pub fn background(mut self, color: Option<Color>) -> Self {
        self.background = color;
        self
    }

    /// Names of scene fields this layout reads.
    fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let regions = self
            .region
            .iter()
            .chain(self.classes.iter().filter_map(|c| c.spawn.as_ref()));
        for region in regions {
            if let Region::Container { level_field, .. } = region {
                out.push(level_field.as_str());
            }
        }
        for class in &self.classes {
            for rule in &class.rules {
                match rule {
                    MotionRule::Drift { field, .. } | MotionRule::TargetSpeed { field, .. } => {
                        out.push(field.as_str())
                    }
                    MotionRule::PipeFlow {
                        speed_field,
                        turbulence_field,
                        ..
                    } => {
                        out.push(speed_field.as_str());
                        out.extend(turbulence_field.as_deref());
                    }
                    _ => {}
                }
            }
            if let Some(tint) = &class.tint {
                out.push(tint.field.as_str());
            }
        }
        out
    }
}

/// Draws a [`SceneSpec`] and owns its particle pool.
#[derive(Debug)]
pub struct SceneRenderer {
    spec: SceneSpec,
    pool: ParticlePool,
    flows: Vec<FlowPath>,
    rng: SpawnContext,
    seed: Option<u64>,
    epoch: Option<u64>,
}

impl SceneRenderer {
    /// Check the layout against the model declaration.
    ///
    /// Classes without a fallback `count` must be declared by the model,
    /// as must every flow id and every scene field a rule reads.
    pub fn new(spec: SceneSpec, decl: &ModelDeclaration) -> Result<Self, SchemaError> {
        let undeclared = |kind: &'static str, name: &str| SchemaError::UndeclaredReference {
            kind,
            name: name.to_string(),
        };
        for class in &spec.classes {
            if class.count.is_none() && !decl.classes.contains(&class.name) {
                return Err(undeclared("particle class", &class.name));
            }
        }
        for path in &spec.flow_paths {
            if !decl.flows.contains(&path.id) {
                return Err(undeclared("flow", &path.id));
            }
        }
        for field in spec.fields() {
            if !decl.fields.iter().any(|f| f == field) {
                return Err(undeclared("scene field", field));
            }
        }

        let flows = spec.flow_paths.iter().cloned().map(FlowPath::new).collect();
        Ok(Self {
            spec,
            pool: ParticlePool::new(),
            flows,
            rng: SpawnContext::new(0),
            seed: None,
            epoch: None,
        })
    }

    pub fn spec(&self) -> &SceneSpec {
        &self.spec
    }

    pub fn pool(&self) -> &ParticlePool {
        &self.pool
    }

    /// Particle count per declared class.
    pub fn counts(&self) -> Vec<usize> {
        self.pool.counts(self.spec.classes.len())
    }

    pub fn flows(&self) -> &[FlowPath] {
        &self.flows
    }

    /// Region shape for the given scene state.
    pub fn shape(&self, scene: &SceneState) -> Shape {
        match &self.spec.region {
            Some(region) => region.shape(scene),
            None => Shape::Rect {
                min: Vec2::ZERO,
                max: self.spec.view,
            },
        }
    }

    fn targets(&self, scene: &SceneState) -> Vec<usize> {
        self.spec
            .classes
            .iter()
            .map(|c| match scene.particle_targets.get(&c.name) {
                Some(&n) => n,
                None => c.count.unwrap_or(0),
            })
            .collect()
    }

    fn step_particles(&mut self, scene: &SceneState, shape: &Shape, dt: f32) {
        let classes = &self.spec.classes;
        let boundary = self.spec.boundary;
        let rng = &mut self.rng;
        let mut exited = Vec::new();

        for p in self.pool.iter_mut() {
            let Some(class) = classes.get(p.class) else {
                continue;
            };
            p.position += p.velocity * dt;

            let mut ctx = MotionContext {
                dt,
                scene,
                shape,
                rng: &mut *rng,
            };
            for rule in class.rules.iter().filter(|r| r.phase() == Phase::Force) {
                rule.apply(p.position, &mut p.velocity, &mut ctx);
            }

            p.state = match shape.resolve(boundary, &mut p.position, &mut p.velocity, p.radius) {
                Contact::Exited => {
                    exited.push(p.id);
                    continue;
                }
                Contact::Touched => ParticleState::Contact,
                Contact::None => ParticleState::Free,
            };

            for rule in class.rules.iter().filter(|r| r.phase() == Phase::Rescale) {
                rule.apply(p.position, &mut p.velocity, &mut ctx);
            }
        }
        self.pool.remove_ids(&exited);
    }

    fn sync_particles(&mut self, scene: &SceneState, shape: &Shape) {
        let targets = self.targets(scene);
        if self.spec.relabel {
            self.pool.relabel(&targets, &mut self.rng);
        }

        let spawn_shapes: Vec<Shape> = self
            .spec
            .classes
            .iter()
            .map(|c| c.spawn.as_ref().map(|r| r.shape(scene)).unwrap_or(*shape))
            .collect();
        let classes = &self.spec.classes;
        let rng = &mut self.rng;
        self.pool.sync(&targets, |class| {
            let spec = &classes[class];
            let position = spawn_shapes[class].random_point(rng, spec.radius);
            let velocity = rng.random_velocity(spec.initial_speed);
            (position, velocity, spec.radius)
        });
    }

    fn class_color(&self, index: usize, scene: &SceneState) -> Color {
        let class = &self.spec.classes[index];
        class
            .tint
            .as_ref()
            .and_then(|t| t.color(scene))
            .or(class.color)
            .unwrap_or_else(|| {
                hsv_to_rgb(index as f32 / self.spec.classes.len().max(1) as f32, 0.7, 0.95)
            })
    }

    fn draw(&self, s: &mut dyn Surface, scene: &SceneState, shape: &Shape, stale: bool) {
        let size = s.size();
        let (w, h) = (size.css_width, size.css_height);
        s.clear_rect(0.0, 0.0, w, h);
        if let Some(bg) = self.spec.background {
            s.set_fill(Paint::Solid(bg));
            s.fill_rect(0.0, 0.0, w, h);
        }
        let view = self.spec.view;
        if size.is_empty() || view.x <= 0.0 || view.y <= 0.0 {
            return;
        }

        let scale = (w / view.x as f64).min(h / view.y as f64);
        s.save();
        s.translate(
            (w - view.x as f64 * scale) / 2.0,
            (h - view.y as f64 * scale) / 2.0,
        );
        s.scale(scale, scale);
        if stale {
            s.set_global_alpha(STALE_ALPHA);
        }

        if self.spec.show_region {
            draw_outline(s, shape);
        }
        for flow in &self.flows {
            flow.draw(s);
        }
        for index in 0..self.spec.classes.len() {
            let color = self.class_color(index, scene);
            s.set_fill(Paint::Solid(color));
            for p in self.pool.iter().filter(|p| p.class == index) {
                s.fill_circle(p.position.x as f64, p.position.y as f64, p.radius as f64);
            }
        }
        for glyph in &self.spec.glyphs {
            draw_glyph(s, glyph, scene.glyphs.get(&glyph.id));
        }
        s.restore();
    }
}

fn draw_outline(s: &mut dyn Surface, shape: &Shape) {
    s.set_stroke(Paint::Solid(Color::AXIS));
    s.set_line_width(1.5);
    s.set_line_dash(&[]);
    match *shape {
        Shape::Rect { min, max } => {
            s.stroke_rect(
                min.x as f64,
                min.y as f64,
                (max.x - min.x) as f64,
                (max.y - min.y) as f64,
            );
        }
        Shape::Circle { center, radius } => {
            s.stroke_circle(center.x as f64, center.y as f64, radius as f64);
        }
        Shape::Pipe {
            start_x,
            end_x,
            center_y,
            radius,
        } => {
            let (x0, x1) = (start_x as f64, end_x as f64);
            s.stroke_line(x0, (center_y - radius) as f64, x1, (center_y - radius) as f64);
            s.stroke_line(x0, (center_y + radius) as f64, x1, (center_y + radius) as f64);
        }
    }
}

impl Renderer for SceneRenderer {
    fn name(&self) -> &str {
        "scene"
    }

    fn target(&self) -> &str {
        &self.spec.canvas_id
    }

    fn render(&mut self, frame: &Frame<'_>, host: &mut dyn RenderHost) -> Result<(), RenderError> {
        let surface = host
            .surface(&self.spec.canvas_id)
            .ok_or_else(|| RenderError::MissingTarget(self.spec.canvas_id.clone()))?;
        surface.check()?;

        if frame.teardown {
            let size = surface.size();
            surface.clear_rect(0.0, 0.0, size.css_width, size.css_height);
            self.pool.clear();
            return Ok(());
        }

        if self.epoch != Some(frame.epoch) {
            if self.epoch.is_some() {
                tracing::debug!(canvas = %self.spec.canvas_id, epoch = frame.epoch, "scene restarted");
            }
            self.epoch = Some(frame.epoch);
            self.pool.clear();
            self.flows.iter_mut().for_each(FlowPath::reset);
            self.seed = None;
        }

        let snap = frame.display_snapshot();
        if let Some(seed) = snap.seed {
            if self.seed != Some(seed) {
                self.rng = SpawnContext::new(seed);
                self.seed = Some(seed);
            }
        }

        let scene = &snap.scene;
        let shape = self.shape(scene);
        let dt = if frame.dt.is_finite() { frame.dt.max(0.0) } else { 0.0 };

        self.step_particles(scene, &shape, dt as f32);
        self.sync_particles(scene, &shape);
        for flow in &mut self.flows {
            let rate = scene.flows.get(flow.id()).copied().unwrap_or(0.0);
            flow.advance(rate, dt);
        }

        self.draw(surface, scene, &shape, frame.is_stale());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverState;
    use crate::model::{GlyphState, Snapshot};
    use crate::params::ParamValues;
    use crate::render::HeadlessHost;
    use crate::scene::glyph::GlyphKind;
    use crate::series::History;
    use crate::surface::CanvasSize;

    fn decl() -> ModelDeclaration {
        ModelDeclaration::new()
            .class("a")
            .class("b")
            .field("speed")
            .glyph("r1")
            .flow("loop")
    }

    fn spec() -> SceneSpec {
        SceneSpec::new("scene", Vec2::new(200.0, 100.0))
            .region(
                Region::Rect {
                    min: Vec2::ZERO,
                    max: Vec2::new(200.0, 100.0),
                },
                Boundary::Reflect,
            )
            .class(
                ParticleClassSpec::new("a").speed(50.0).with_rule(MotionRule::TargetSpeed {
                    field: "speed".into(),
                    scale: 1.0,
                }),
            )
            .class(ParticleClassSpec::new("b").color(Color::RED))
            .glyph(GlyphSpec::new("r1", GlyphKind::Resistor, Vec2::new(100.0, 50.0), 40.0))
            .flow(FlowPathSpec::new(
                "loop",
                vec![Vec2::new(10.0, 10.0), Vec2::new(190.0, 10.0)],
                20.0,
            ))
    }

    struct Fixture {
        history: History,
        params: ParamValues,
        decl: ModelDeclaration,
    }

    impl Fixture {
        fn new() -> Self {
            let decl = decl();
            Self {
                history: History::from_declaration(&decl),
                params: ParamValues::from_pairs(&[]),
                decl,
            }
        }

        fn frame<'a>(&'a self, snapshot: &'a Snapshot, epoch: u64, dt: f64) -> Frame<'a> {
            Frame {
                index: 0,
                revision: 0,
                epoch,
                sim_time: 0.0,
                dt,
                sim_dt: dt,
                snapshot,
                last_valid: Some(snapshot),
                history: &self.history,
                params: &self.params,
                declaration: &self.decl,
                state: DriverState::Running,
                diagnostic: None,
                teardown: false,
            }
        }
    }

    fn host() -> HeadlessHost {
        HeadlessHost::new().with_canvas("scene", CanvasSize::new(400.0, 200.0, 1.0))
    }

    #[test]
    fn test_counts_track_targets() {
        let fx = Fixture::new();
        let mut r = SceneRenderer::new(spec(), &fx.decl).unwrap();
        let mut host = host();

        for (a, b) in [(30, 5), (12, 40), (0, 0), (7, 7)] {
            let snap = Snapshot::empty()
                .with_target("a", a)
                .with_target("b", b)
                .with_field("speed", 40.0)
                .with_seed(1);
            r.render(&fx.frame(&snap, 0, 1.0 / 60.0), &mut host).unwrap();
            assert_eq!(r.counts(), vec![a, b]);
            assert_eq!(r.pool().len(), a + b);
        }
    }

    #[test]
    fn test_particles_stay_inside_region() {
        let fx = Fixture::new();
        let mut r = SceneRenderer::new(spec(), &fx.decl).unwrap();
        let mut host = host();
        let snap = Snapshot::empty()
            .with_target("a", 50)
            .with_field("speed", 400.0)
            .with_seed(3);
        let shape = r.shape(&snap.scene);
        for _ in 0..120 {
            r.render(&fx.frame(&snap, 0, 0.05), &mut host).unwrap();
            for p in r.pool().iter() {
                assert!(shape.contains(p.position, p.radius), "{:?}", p.position);
            }
        }
    }

    #[test]
    fn test_epoch_change_clears_pool() {
        let fx = Fixture::new();
        let mut r = SceneRenderer::new(spec(), &fx.decl).unwrap();
        let mut host = host();
        let snap = Snapshot::empty().with_target("a", 10).with_field("speed", 1.0);
        r.render(&fx.frame(&snap, 0, 0.016), &mut host).unwrap();
        let ids: Vec<u64> = r.pool().iter().map(|p| p.id).collect();

        r.render(&fx.frame(&snap, 1, 0.016), &mut host).unwrap();
        assert_eq!(r.pool().len(), 10);
        assert!(r.pool().iter().all(|p| !ids.contains(&p.id)));
    }

    #[test]
    fn test_same_seed_same_layout() {
        let fx = Fixture::new();
        let snap = Snapshot::empty()
            .with_target("a", 20)
            .with_field("speed", 30.0)
            .with_seed(42);

        let run = || {
            let mut r = SceneRenderer::new(spec(), &fx.decl).unwrap();
            let mut host = host();
            for _ in 0..10 {
                r.render(&fx.frame(&snap, 0, 0.02), &mut host).unwrap();
            }
            r.pool().iter().map(|p| p.position).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_draws_glyph_flow_and_balances_stack() {
        let fx = Fixture::new();
        let mut r = SceneRenderer::new(spec(), &fx.decl).unwrap();
        let mut host = host();
        let snap = Snapshot::empty()
            .with_glyph("r1", GlyphState::active(true).with_intensity(0.5))
            .with_flow("loop", 1.0);
        r.render(&fx.frame(&snap, 0, 0.1), &mut host).unwrap();

        let canvas = host.canvas("scene").unwrap();
        assert_eq!(canvas.depth(), 0);
        assert!(!canvas.circles().is_empty());
        assert!(r.flows()[0].phase() > 0.0);
    }

    #[test]
    fn test_undeclared_flow_rejected() {
        let spec = spec().flow(FlowPathSpec::new("ghost", vec![Vec2::ZERO, Vec2::X], 1.0));
        let err = SceneRenderer::new(spec, &decl()).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UndeclaredReference {
                kind: "flow",
                name: "ghost".into()
            }
        );
    }

    #[test]
    fn test_missing_canvas_reported() {
        let fx = Fixture::new();
        let mut r = SceneRenderer::new(spec(), &fx.decl).unwrap();
        let mut host = HeadlessHost::new();
        let snap = Snapshot::empty();
        assert_eq!(
            r.render(&fx.frame(&snap, 0, 0.0), &mut host),
            Err(RenderError::MissingTarget("scene".into()))
        );
    }
}
