//! Unit tests for surface_commands.rs

use super::*;

#[test]
fn test_effects_keep_push_order() {
    let commands = SurfaceCommands::new();
    commands.redraw_pass(NodeId(2));
    commands.flush();
    commands.flush_pass(NodeId(2));
    commands.redraw();

    assert_eq!(commands.len(), 4);
    assert_eq!(commands.take(), vec![
        Effect::RedrawPass(NodeId(2)),
        Effect::Flush,
        Effect::FlushPass(NodeId(2)),
        Effect::Redraw,
    ]);
    assert!(commands.is_empty());
}

#[test]
fn test_clones_share_the_queue() {
    let commands = SurfaceCommands::new();
    let clone = commands.clone();
    clone.flush();

    assert_eq!(commands.len(), 1);
    assert_eq!(commands.take(), vec![Effect::Flush]);
    assert!(clone.take().is_empty());
}
