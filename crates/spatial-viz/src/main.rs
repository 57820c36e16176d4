use macroquad::prelude::*;
use nalgebra::{Matrix4, Point3, Vector4};
use spatial_tree::{Bsp, KdopTree, Ray3, View};
use spatial_viz::{Level, MeshSink, OrbitCamera, ShelfAtlas, draw_bounds};

const ROOMS: usize = 9;
const ATLAS_PAGE_SIZE: u32 = 32;
const MAX_BOX_LEVEL: usize = 12;

/// Segment under the mouse cursor, from the near plane to the far plane.
fn mouse_ray(view_projection: &Matrix4<f32>) -> Option<Ray3> {
    let inverse = view_projection.try_inverse()?;
    let (mouse_x, mouse_y) = mouse_position();
    let x = 2.0 * mouse_x / screen_width() - 1.0;
    let y = 1.0 - 2.0 * mouse_y / screen_height();
    let unproject = |z: f32| {
        let p = inverse * Vector4::new(x, y, z, 1.0);
        Point3::new(p.x / p.w, p.y / p.w, p.z / p.w)
    };
    Some(Ray3::segment(unproject(-1.0), unproject(1.0)))
}

#[macroquad::main("Level Viewer")]
async fn main() {
    println!("Generating corridor of {} rooms...", ROOMS);
    let level = Level::corridor(ROOMS);
    let center = level.center();

    println!("Building kDOP tree...");
    let kdop = match KdopTree::build(&level.triangles, level.vertices()) {
        Ok(tree) => tree,
        Err(err) => {
            println!("kDOP build failed: {}", err);
            return;
        }
    };
    let kdop_stats = kdop.stats();
    println!(
        "kDOP tree built: {} triangles, {} nodes, {} leaves, depth {}",
        kdop.triangles().len(),
        kdop_stats.nodes,
        kdop_stats.leaves,
        kdop_stats.max_depth
    );

    println!("Loading BSP...");
    let mut atlas = ShelfAtlas::new(ATLAS_PAGE_SIZE);
    let loaded = Bsp::from_data(level.data).and_then(|mut bsp| bsp.init(&mut atlas).map(|()| bsp));
    let mut bsp = match loaded {
        Ok(bsp) => bsp,
        Err(err) => {
            println!("BSP load failed: {}", err);
            return;
        }
    };
    println!(
        "BSP loaded: {} leaves, {} faces, {} lightmap pages",
        bsp.leaves().len(),
        bsp.faces().len(),
        atlas.page_count()
    );

    let mut camera = OrbitCamera::new(250.0, 0.6, 0.5)
        .with_zoom(10.0, 20.0, 800.0)
        .with_target(vec3(center.x, center.y, center.z));
    let mut box_level = 0;

    loop {
        camera.update();
        if is_key_pressed(KeyCode::E) {
            box_level = (box_level + 1).min(MAX_BOX_LEVEL);
        }
        if is_key_pressed(KeyCode::Q) {
            box_level = box_level.saturating_sub(1);
        }

        clear_background(Color::from_rgba(20, 20, 30, 255));
        set_camera(&camera.to_camera3d());

        let view = View {
            position: camera.eye_point(),
            projection: camera.projection_matrix(screen_width() / screen_height()),
            view: camera.view_matrix(),
        };
        let mut sink = MeshSink::new(&atlas);
        let stats = bsp.render(&view, &atlas, &mut sink);

        if box_level > 0 {
            for bounds in kdop.boxes_at_level(box_level) {
                draw_bounds(&bounds, YELLOW);
            }
        }
        let hovering =
            mouse_ray(&(view.projection * view.view)).is_some_and(|ray| kdop.line_check(&ray));

        draw_line_3d(vec3(0.0, 0.0, 0.0), vec3(16.0, 0.0, 0.0), RED);
        draw_line_3d(vec3(0.0, 0.0, 0.0), vec3(0.0, 16.0, 0.0), GREEN);
        draw_line_3d(vec3(0.0, 0.0, 0.0), vec3(0.0, 0.0, 16.0), BLUE);

        set_default_camera();

        draw_text(
            &format!("Level Viewer - {} rooms, {} faces", ROOMS, bsp.faces().len()),
            10.0,
            25.0,
            20.0,
            WHITE,
        );
        draw_text(
            &format!(
                "Cluster: {:?} | Visible leaves: {} | Visible faces: {} | Batches: {}",
                bsp.current_cluster().index(),
                stats.visible_leaves,
                stats.visible_faces,
                sink.batches
            ),
            10.0,
            45.0,
            18.0,
            GRAY,
        );
        draw_text(
            &format!(
                "kDOP boxes at level {} (Q/E) | Cursor over geometry: {}",
                box_level,
                if hovering { "yes" } else { "no" }
            ),
            10.0,
            65.0,
            18.0,
            if hovering { GREEN } else { GRAY },
        );

        draw_text(
            "Drag mouse to rotate, scroll to zoom, A/D to move along the corridor",
            10.0,
            90.0,
            16.0,
            DARKGRAY,
        );
        draw_text(&format!("FPS: {}", get_fps()), 10.0, 110.0, 16.0, DARKGRAY);

        next_frame().await
    }
}
