//! Display list for one frame. Shapes are tessellated with lyon into a
//! single vertex stream; images stay as textured-quad commands. The GPU
//! renderer in [`crate::render::present`] replays it.

use std::ops::Range;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use lyon::geom::Angle;
use lyon::math::{Box2D, Point, Transform, point, vector};
use lyon::path::{Path, Polygon};
use lyon::tessellation::{
    BuffersBuilder, FillGeometryBuilder, FillOptions, FillTessellator, FillVertex, StrokeOptions,
    StrokeTessellator, StrokeVertex, TessellationResult, VertexBuffers,
};
use palette::Srgba;
use tracing::warn;

use crate::motion::clamp01;
use crate::processing::color::{ColorGrade, GradeMatrix};
use crate::processing::layout::DrawRect;
use crate::render::surface::{BlendMode, DrawSurface};

/// Curve flattening tolerance in pixels.
const TOLERANCE: f32 = 0.25;

pub const KIND_SOLID: u32 = 0;
pub const KIND_RADIAL: u32 = 1;
pub const KIND_LINEAR: u32 = 2;

/// Colours are premultiplied, sRGB-encoded and already scaled by the global
/// alpha. Gradients carry their geometry in `params`: `[cx, cy, radius, _]`
/// for radial, `[x0, y0, x1, y1]` for linear.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ShapeVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
    pub color_end: [f32; 4],
    pub params: [f32; 4],
    pub kind: u32,
}

#[derive(Debug, Clone)]
pub enum SceneCommand {
    /// Triangles `indices` of the shared geometry, all with one blend mode.
    Shapes {
        blend: BlendMode,
        indices: Range<u32>,
    },
    Image {
        image: Arc<RgbaImage>,
        dest: DrawRect,
        alpha: f32,
        grade: Option<GradeMatrix>,
    },
}

#[derive(Clone, Copy)]
struct Paint {
    color: [f32; 4],
    color_end: [f32; 4],
    params: [f32; 4],
    kind: u32,
}

impl Paint {
    fn solid(color: [f32; 4]) -> Self {
        Self {
            color,
            color_end: color,
            params: [0.0; 4],
            kind: KIND_SOLID,
        }
    }

    fn vertex(&self, p: Point) -> ShapeVertex {
        ShapeVertex {
            position: p.to_array(),
            color: self.color,
            color_end: self.color_end,
            params: self.params,
            kind: self.kind,
        }
    }
}

pub struct Scene {
    size: (u32, u32),
    global_alpha: f32,
    grade: Option<GradeMatrix>,
    geometry: VertexBuffers<ShapeVertex, u32>,
    commands: Vec<SceneCommand>,
    fill: FillTessellator,
    stroke: StrokeTessellator,
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width.max(1), height.max(1)),
            global_alpha: 1.0,
            grade: None,
            geometry: VertexBuffers::new(),
            commands: Vec::new(),
            fill: FillTessellator::new(),
            stroke: StrokeTessellator::new(),
        }
    }

    /// Changes the target size, dropping anything recorded at the old one.
    /// Returns whether the size changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let size = (width.max(1), height.max(1));
        if self.size == size {
            return false;
        }
        self.size = size;
        self.clear();
        true
    }

    /// Empties the display list; allocations are kept for the next frame.
    pub fn clear(&mut self) {
        self.geometry.vertices.clear();
        self.geometry.indices.clear();
        self.commands.clear();
        self.global_alpha = 1.0;
        self.grade = None;
    }

    pub fn vertices(&self) -> &[ShapeVertex] {
        &self.geometry.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.geometry.indices
    }

    pub fn commands(&self) -> &[SceneCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn bounds(&self) -> Box2D {
        Box2D::new(
            point(0.0, 0.0),
            point(self.size.0 as f32, self.size.1 as f32),
        )
    }

    fn premultiply(&self, c: Srgba<u8>) -> [f32; 4] {
        let a = f32::from(c.alpha) / 255.0 * self.global_alpha;
        [
            f32::from(c.red) / 255.0 * a,
            f32::from(c.green) / 255.0 * a,
            f32::from(c.blue) / 255.0 * a,
            a,
        ]
    }

    fn fill_with(
        &mut self,
        blend: BlendMode,
        paint: Paint,
        op: impl FnOnce(&mut FillTessellator, &mut dyn FillGeometryBuilder) -> TessellationResult,
    ) {
        let start = self.geometry.indices.len() as u32;
        let mut builder =
            BuffersBuilder::new(&mut self.geometry, move |v: FillVertex| paint.vertex(v.position()));
        if let Err(err) = op(&mut self.fill, &mut builder) {
            warn!(?err, "fill tessellation failed");
            return;
        }
        let end = self.geometry.indices.len() as u32;
        self.push_shapes(blend, start..end);
    }

    fn push_shapes(&mut self, blend: BlendMode, indices: Range<u32>) {
        if indices.is_empty() {
            return;
        }
        if let Some(SceneCommand::Shapes {
            blend: last,
            indices: range,
        }) = self.commands.last_mut()
        {
            if *last == blend && range.end == indices.start {
                range.end = indices.end;
                return;
            }
        }
        self.commands.push(SceneCommand::Shapes { blend, indices });
    }
}

fn arc_path(center: Point, radius: f32, start: f32, sweep: f32) -> Path {
    let closed = sweep >= std::f32::consts::TAU;
    let sweep = sweep.min(std::f32::consts::TAU);
    let from = center + vector(start.cos(), start.sin()) * radius;
    let mut builder = Path::builder().with_svg();
    builder.move_to(from);
    builder.arc(
        center,
        vector(radius, radius),
        Angle::radians(sweep),
        Angle::zero(),
    );
    if closed {
        builder.close();
    }
    builder.build()
}

impl DrawSurface for Scene {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.global_alpha = clamp01(alpha);
    }

    fn set_grade(&mut self, grade: Option<ColorGrade>) {
        self.grade = grade.filter(|g| !g.is_identity()).map(|g| g.matrix());
    }

    fn fill_rect(&mut self, rect: Box2D, color: Srgba<u8>) {
        let color = self.premultiply(color);
        if color[3] <= 0.0 || rect.is_empty() {
            return;
        }
        self.fill_with(BlendMode::SourceOver, Paint::solid(color), |fill, out| {
            fill.tessellate_rectangle(&rect, &FillOptions::default(), out)
        });
    }

    fn fill_wedge(&mut self, transform: &Transform, points: [Point; 3], color: Srgba<u8>) {
        let color = self.premultiply(color);
        if color[3] <= 0.0 {
            return;
        }
        let points = points.map(|p| transform.transform_point(p));
        self.fill_with(BlendMode::SourceOver, Paint::solid(color), |fill, out| {
            fill.tessellate_polygon(
                Polygon {
                    points: &points,
                    closed: true,
                },
                &FillOptions::tolerance(TOLERANCE),
                out,
            )
        });
    }

    fn fill_annular_arc(
        &mut self,
        center: Point,
        radius: f32,
        width: f32,
        start: f32,
        sweep: f32,
        color: Srgba<u8>,
    ) {
        let color = self.premultiply(color);
        if color[3] <= 0.0 || radius <= 0.0 || width <= 0.0 || sweep <= 0.0 {
            return;
        }
        let path = arc_path(center, radius, start, sweep);
        let paint = Paint::solid(color);
        let start_index = self.geometry.indices.len() as u32;
        let mut builder =
            BuffersBuilder::new(&mut self.geometry, move |v: StrokeVertex| paint.vertex(v.position()));
        let options = StrokeOptions::tolerance(TOLERANCE).with_line_width(width);
        if let Err(err) = self.stroke.tessellate_path(&path, &options, &mut builder) {
            warn!(?err, "arc tessellation failed");
            return;
        }
        let end = self.geometry.indices.len() as u32;
        self.push_shapes(BlendMode::SourceOver, start_index..end);
    }

    fn fill_radial_gradient(
        &mut self,
        center: Point,
        radius: f32,
        inner: Srgba<u8>,
        outer: Srgba<u8>,
        blend: BlendMode,
    ) {
        let inner = self.premultiply(inner);
        let outer = self.premultiply(outer);
        if inner[3] <= 0.0 && outer[3] <= 0.0 {
            return;
        }
        let radius = radius.max(f32::EPSILON);
        // Nothing to draw beyond the radius when the outer stop is clear.
        let area = if outer[3] <= 0.0 {
            let reach = vector(radius, radius);
            Box2D::new(center - reach, center + reach).intersection_unchecked(&self.bounds())
        } else {
            self.bounds()
        };
        if area.is_empty() {
            return;
        }
        let paint = Paint {
            color: inner,
            color_end: outer,
            params: [center.x, center.y, radius, 0.0],
            kind: KIND_RADIAL,
        };
        self.fill_with(blend, paint, |fill, out| {
            fill.tessellate_rectangle(&area, &FillOptions::default(), out)
        });
    }

    fn fill_linear_gradient(&mut self, from: Point, to: Point, start: Srgba<u8>, end: Srgba<u8>) {
        let start = self.premultiply(start);
        let end = self.premultiply(end);
        if start[3] <= 0.0 && end[3] <= 0.0 {
            return;
        }
        let area = self.bounds();
        let paint = Paint {
            color: start,
            color_end: end,
            params: [from.x, from.y, to.x, to.y],
            kind: KIND_LINEAR,
        };
        self.fill_with(BlendMode::SourceOver, paint, |fill, out| {
            fill.tessellate_rectangle(&area, &FillOptions::default(), out)
        });
    }

    fn draw_image(&mut self, image: &Arc<RgbaImage>, dest: DrawRect) {
        if self.global_alpha <= 0.0
            || dest.w <= 0.0
            || dest.h <= 0.0
            || image.width() == 0
            || image.height() == 0
        {
            return;
        }
        self.commands.push(SceneCommand::Image {
            image: Arc::clone(image),
            dest,
            alpha: self.global_alpha,
            grade: self.grade,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn full(scene: &Scene) -> Box2D {
        scene.bounds()
    }

    #[test]
    fn global_alpha_is_premultiplied_into_colours() {
        let mut scene = Scene::new(10, 10);
        scene.set_global_alpha(0.5);
        scene.fill_rect(full(&scene), Srgba::new(255, 0, 0, 255));
        assert_eq!(scene.vertices().len(), 4);
        assert_eq!(scene.indices().len(), 6);
        for v in scene.vertices() {
            assert_eq!(v.color, [0.5, 0.0, 0.0, 0.5]);
            assert_eq!(v.kind, KIND_SOLID);
        }
    }

    #[test]
    fn clear_shapes_are_not_recorded() {
        let mut scene = Scene::new(10, 10);
        scene.set_global_alpha(0.0);
        scene.fill_rect(full(&scene), Srgba::new(255, 255, 255, 255));
        scene.draw_image(
            &Arc::new(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]))),
            DrawRect {
                x: 0.0,
                y: 0.0,
                w: 10.0,
                h: 10.0,
            },
        );
        scene.set_global_alpha(1.0);
        scene.fill_rect(full(&scene), Srgba::new(255, 255, 255, 0));
        scene.fill_annular_arc(point(5.0, 5.0), 3.0, 1.0, 0.0, 0.0, Srgba::new(255, 255, 255, 255));
        assert!(scene.is_empty());
        assert!(scene.vertices().is_empty());
    }

    #[test]
    fn same_blend_shapes_share_one_draw() {
        let mut scene = Scene::new(20, 20);
        let frame = Transform::rotation(Angle::radians(0.3)).then_translate(vector(10.0, 10.0));
        scene.fill_rect(full(&scene), Srgba::new(0, 0, 0, 255));
        scene.fill_wedge(
            &frame,
            [point(0.0, 0.0), point(8.0, -2.0), point(8.0, 2.0)],
            Srgba::new(9, 9, 9, 255),
        );
        scene.fill_radial_gradient(
            point(10.0, 10.0),
            5.0,
            Srgba::new(255, 255, 255, 64),
            Srgba::new(255, 255, 255, 0),
            BlendMode::Screen,
        );
        scene.fill_rect(full(&scene), Srgba::new(0, 0, 0, 10));

        let blends: Vec<_> = scene
            .commands()
            .iter()
            .map(|c| match c {
                SceneCommand::Shapes { blend, .. } => *blend,
                SceneCommand::Image { .. } => panic!("no images drawn"),
            })
            .collect();
        assert_eq!(
            blends,
            [BlendMode::SourceOver, BlendMode::Screen, BlendMode::SourceOver]
        );
        let SceneCommand::Shapes { indices, .. } = &scene.commands()[0] else {
            unreachable!();
        };
        assert_eq!(indices.clone(), 0..9);
    }

    #[test]
    fn wedge_is_mapped_through_its_transform() {
        let mut scene = Scene::new(100, 100);
        let frame = Transform::translation(50.0, 40.0);
        scene.fill_wedge(
            &frame,
            [point(0.0, 0.0), point(10.0, -3.0), point(10.0, 3.0)],
            Srgba::new(255, 255, 255, 255),
        );
        let xs: Vec<f32> = scene.vertices().iter().map(|v| v.position[0]).collect();
        assert_eq!(scene.vertices().len(), 3);
        assert!(xs.iter().all(|x| (50.0..=60.0).contains(x)));
    }

    #[test]
    fn full_ring_stays_within_its_width() {
        let mut scene = Scene::new(200, 200);
        let center = point(100.0, 100.0);
        scene.fill_annular_arc(
            center,
            40.0,
            4.0,
            0.0,
            std::f32::consts::TAU,
            Srgba::new(255, 255, 255, 255),
        );
        assert!(scene.vertices().len() > 16);
        for v in scene.vertices() {
            let d = (Point::from(v.position) - center).length();
            assert!((37.5..=42.5).contains(&d), "vertex at distance {d}");
        }
    }

    #[test]
    fn clear_outer_radial_is_clipped_to_its_circle() {
        let mut scene = Scene::new(400, 300);
        scene.fill_radial_gradient(
            point(390.0, 150.0),
            50.0,
            Srgba::new(255, 255, 255, 255),
            Srgba::new(255, 255, 255, 0),
            BlendMode::SourceOver,
        );
        let min_x = scene
            .vertices()
            .iter()
            .map(|v| v.position[0])
            .fold(f32::INFINITY, f32::min);
        let max_x = scene
            .vertices()
            .iter()
            .map(|v| v.position[0])
            .fold(f32::NEG_INFINITY, f32::max);
        assert_eq!((min_x, max_x), (340.0, 400.0));
        assert!(scene.vertices().iter().all(|v| v.kind == KIND_RADIAL));
        assert_eq!(scene.vertices()[0].params, [390.0, 150.0, 50.0, 0.0]);
    }

    #[test]
    fn images_keep_their_bitmap_and_grade() {
        let bitmap = Arc::new(RgbaImage::from_pixel(4, 2, Rgba([1, 2, 3, 255])));
        let dest = DrawRect {
            x: -5.0,
            y: 0.0,
            w: 40.0,
            h: 20.0,
        };
        let mut scene = Scene::new(30, 20);
        scene.set_grade(Some(ColorGrade::IDENTITY));
        scene.set_global_alpha(0.25);
        scene.draw_image(&bitmap, dest);
        scene.set_grade(Some(ColorGrade::default()));
        scene.draw_image(&bitmap, dest);

        let grades: Vec<_> = scene
            .commands()
            .iter()
            .map(|c| match c {
                SceneCommand::Image {
                    image,
                    alpha,
                    grade,
                    ..
                } => {
                    assert!(Arc::ptr_eq(image, &bitmap));
                    assert_eq!(*alpha, 0.25);
                    *grade
                }
                SceneCommand::Shapes { .. } => panic!("no shapes drawn"),
            })
            .collect();
        assert_eq!(grades, [None, Some(ColorGrade::default().matrix())]);
    }

    #[test]
    fn resize_drops_the_recorded_frame() {
        let mut scene = Scene::new(10, 10);
        scene.fill_rect(full(&scene), Srgba::new(0, 0, 0, 255));
        assert!(!scene.resize(10, 10));
        assert!(!scene.is_empty());
        assert!(scene.resize(20, 10));
        assert!(scene.is_empty());
        assert_eq!(scene.size(), (20, 10));
    }
}
