use super::*;

fn unit_view() -> ViewPlan {
    ViewPlan {
        alpha: 1.0,
        opaque_coverage: OpaqueCoverage::Full,
        rotated: false,
        scale_x: 1.0,
        scale_y: 1.0,
    }
}

fn reason(path: CompositionPath) -> String {
    match path {
        CompositionPath::Software { reason } => reason,
        CompositionPath::Hardware => panic!("expected a software fallback"),
    }
}

#[test]
fn unit_views_compose_in_hardware() {
    let views = [unit_view(); 4];
    assert_eq!(plan_frame(&views, None, false), CompositionPath::Hardware);
}

#[test]
fn budget_overflow_falls_back() {
    let views = [unit_view(); 5];
    assert_eq!(plan_frame(&views, Some(6), false), CompositionPath::Hardware);
    assert!(reason(plan_frame(&views, Some(4), false)).contains("budget"));
}

#[test]
fn zero_budget_means_unlimited() {
    let views = [unit_view(); 12];
    assert_eq!(plan_frame(&views, Some(0), false), CompositionPath::Hardware);
}

#[test]
fn rotation_has_no_hardware_path() {
    let mut views = [unit_view(); 2];
    views[1].rotated = true;
    assert!(reason(plan_frame(&views, None, true)).contains("rotated"));
}

#[test]
fn translucency_composes_unless_the_opaque_region_is_partial() {
    let mut view = unit_view();
    view.alpha = 0.5;

    view.opaque_coverage = OpaqueCoverage::Empty;
    assert_eq!(plan_frame(&[view], None, false), CompositionPath::Hardware);

    view.opaque_coverage = OpaqueCoverage::Full;
    assert_eq!(plan_frame(&[view], None, false), CompositionPath::Hardware);

    view.opaque_coverage = OpaqueCoverage::Partial;
    assert!(reason(plan_frame(&[view], None, false)).contains("opaque"));
}

#[test]
fn scaling_needs_the_resizer() {
    let mut view = unit_view();
    view.scale_x = 0.5;

    assert_eq!(plan_frame(&[view], None, true), CompositionPath::Hardware);
    assert!(reason(plan_frame(&[view], None, false)).contains("scaled"));
}

#[test]
fn mirrored_views_fall_back_even_with_the_resizer() {
    let mut view = unit_view();
    view.scale_x = -1.0;
    assert!(matches!(
        plan_frame(&[view], None, true),
        CompositionPath::Software { .. }
    ));
}

#[test]
fn opaque_partial_coverage_is_fine_at_full_alpha() {
    let mut view = unit_view();
    view.opaque_coverage = OpaqueCoverage::Partial;
    assert_eq!(plan_frame(&[view], None, false), CompositionPath::Hardware);
}
