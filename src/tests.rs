#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::num::NonZero;

    use itertools::Itertools;
    use proptest::prelude::*;

    use crate::builder::{BoardBuilder, BuilderInvalidReason};
    use crate::compact::compact;
    use crate::error::RoomError;
    use crate::fingerprint::Fingerprint;
    use crate::location::Location;
    use crate::network::RoomNetwork;
    use crate::portal::{PortalId, StateBoxSwap};
    use crate::progress::Silent;
    use crate::room::{Room, RoomId};
    use crate::state::{StateCatalog, StateId};
    use crate::variant::{compress_path, uncompress_path, Variant, VariantCatalog, VariantId};
    use crate::Limits;

    const CORRIDOR: &str = "######
#@ $.#
######";

    // walkable cells: 6 7 8 / 11 12 13 / 16 17 18, boxes on 11 and 12
    const TWO_BOXES: &str = "#####
#. .#
#$$ #
# @ #
#####";

    // walkable cells: 7 player, 8 floor, 9 box, 10 goal
    fn corridor() -> RoomNetwork {
        RoomNetwork::from_board(BoardBuilder::parse(CORRIDOR).build().unwrap()).unwrap()
    }

    /// Merge the floor and box cells of the corridor, after rewriting variant 1 of the box cell with `edit`.
    ///
    /// Variant 1 is entered from the floor cell with the box present; it pushes the box onto the goal and walks back.
    fn merge_floor_and_box(edit: impl Fn(&mut Variant)) -> Room {
        let mut network = corridor();
        let room = &mut network.rooms[2];
        let mut variants = VariantCatalog::new();
        for (id, variant) in room.variants().iter() {
            let mut variant = variant.clone();
            if id == VariantId(1) {
                edit(&mut variant);
            }
            variants.push(variant);
        }
        room.variants = variants;

        let id = network.merge(RoomId(1), RoomId(2), &mut Silent).unwrap();
        network.room(id).unwrap().clone()
    }

    /// Variants of the merged floor and box cells entered from the player's side while the box is still in place.
    fn entered_with_box(room: &Room) -> Vec<Variant> {
        let portal = room.portals().iter().find(|portal| portal.from_pos == 7).unwrap();
        let state = room.states().find(&[9]).unwrap();
        portal.spans.variants(state).map(|id| room.variant(id).clone()).collect_vec()
    }

    fn variants_of(network: &RoomNetwork, id: RoomId) -> Vec<Variant> {
        network.room(id).unwrap().variants().iter().map(|(_, v)| v.clone()).collect_vec()
    }

    /// Merge the lowest neighbor pair until one room is left.
    fn merge_all(network: &mut RoomNetwork) {
        while network.len() > 1 {
            let pair = network.neighbor_pairs()[0];
            network.merge(pair.0, pair.1, &mut Silent).unwrap();
            network.validate().unwrap();
        }
    }

    #[test]
    fn parse_and_display() {
        let board = BoardBuilder::parse("#######
#+*$$.#
#######").build().unwrap();

        assert_eq!(format!("{}", board), "#######
#+*$$.#
#######
");
        assert_eq!(board.boxes(), &[9, 10, 11]);
        assert_eq!(board.player(), 8);
        assert_eq!(board.goal_count(), 3);
    }

    #[test]
    fn build_with_dims() {
        let board = BoardBuilder::with_dims((NonZero::new(5).unwrap(), NonZero::new(3).unwrap()))
            .set_player(Location(1, 1))
            .add_box(Location(2, 1))
            .add_goal(Location(3, 1))
            .add_wall(Location(0, 0))
            .build()
            .unwrap();

        assert_eq!(format!("{}", board), "#    \n @$. \n     \n");
        assert_eq!(board.walkable_positions().len(), 14);
    }

    #[test]
    fn pop_box() {
        let board = BoardBuilder::parse("#@ .#")
            .add_box(Location(2, 0))
            .add_box(Location(3, 0))
            .pop_box()
            .build()
            .unwrap();

        assert_eq!(format!("{}", board), "#@$.#
");
    }

    #[test]
    fn builder_invalid_reasons() {
        assert_eq!(
            BoardBuilder::with_dims((NonZero::new(3).unwrap(), NonZero::new(3).unwrap()))
                .add_wall(Location(5, 0))
                .add_wall(Location(1, 1))
                .is_valid(),
            Some(&vec![BuilderInvalidReason::FeatureOutOfBounds])
        );
        assert_eq!(
            BoardBuilder::parse("#@x#").is_valid(),
            Some(&vec![BuilderInvalidReason::UnknownCharacter('x')])
        );
        assert_eq!(BoardBuilder::parse("#$.#").build().unwrap_err(), vec![BuilderInvalidReason::MissingPlayer]);
        assert_eq!(
            BoardBuilder::parse("#@$ #").build().unwrap_err(),
            vec![BuilderInvalidReason::BoxGoalMismatch { boxes: 1, goals: 0 }]
        );
        assert_eq!(BoardBuilder::parse("\n\n").build().unwrap_err(), vec![BuilderInvalidReason::EmptyLevel]);
        assert_eq!(
            BoardBuilder::parse("#@#").add_box(Location(0, 0)).is_valid(),
            Some(&vec![BuilderInvalidReason::FeatureOnWall])
        );
    }

    #[test]
    fn board_geometry() {
        let board = BoardBuilder::parse(CORRIDOR).build().unwrap();

        assert_eq!(board.walkable_positions(), &[7, 8, 9, 10]);
        assert!(board.is_corner(7));
        assert!(!board.is_corner(8));
        assert!(board.is_corner(10));
        assert!(board.is_dead(7));
        assert!(!board.is_dead(10));
        assert!(board.is_dead(11));
        assert_eq!(board.location(9), Location(3, 1));
    }

    #[test]
    fn single_cell_rooms() {
        let network = corridor();
        assert_eq!(network.len(), 4);
        network.validate().unwrap();

        let start = network.room(RoomId(0)).unwrap();
        assert_eq!(start.states().len(), 1);
        assert_eq!(start.start_variant_count(), 1);
        assert_eq!(start.variant(start.start_variants().next().unwrap()).path, "r");

        let floor = network.room(RoomId(1)).unwrap();
        assert_eq!(floor.states().len(), 2);
        assert_eq!(floor.variants().len(), 4);
        assert_eq!(floor.portal(PortalId(1)).swap.get(StateId(0)), Some(StateId(1)));
        assert_eq!(floor.portal(PortalId(0)).swap.get(StateId(0)), None);

        let boxed = network.room(RoomId(2)).unwrap();
        assert_eq!(boxed.start_state(), StateId(1));
        assert_eq!(boxed.variants().len(), 5);
        let span = boxed.portal(PortalId(0)).spans.get(StateId(1)).unwrap();
        assert_eq!(span.count, 2);
        let terminal = boxed.variant(span.ids().last().unwrap());
        assert!(terminal.is_terminal());
        assert_eq!((terminal.moves, terminal.pushes), (0, 1));

        let goal = network.room(RoomId(3)).unwrap();
        assert_eq!(goal.states().get(StateId(0)), &[10]);
        assert_eq!(goal.start_state(), StateId(1));
        assert!(goal.variants().is_empty());
        assert_eq!(goal.portal(PortalId(0)).swap.get(StateId(1)), Some(StateId(0)));
        assert!(goal.portal(PortalId(0)).blocked_box);
    }

    #[test]
    fn dead_box_is_rejected() {
        let board = BoardBuilder::parse("#####
#$@.#
#####").build().unwrap();

        assert_eq!(RoomNetwork::from_board(board).unwrap_err(), RoomError::DeadBox(Location(1, 1)));
    }

    #[test]
    fn adjacency_and_lookup() {
        let network = corridor();
        let graph = network.adjacency();

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.edge_weight(RoomId(1), RoomId(2)), Some(&1));
        assert_eq!(network.neighbor_pairs().len(), 3);
        assert_eq!(network.room_of(9), Some(RoomId(2)));
        assert_eq!(network.room_of(0), None);
        assert_eq!(network.start_room(), Some(RoomId(0)));
    }

    #[test]
    fn merge_preconditions() {
        let mut network = corridor();

        assert_eq!(
            network.merge(RoomId(0), RoomId(2), &mut Silent).unwrap_err(),
            RoomError::NoSharedPortal { first: RoomId(0), second: RoomId(2) }
        );
        assert_eq!(network.merge(RoomId(0), RoomId(9), &mut Silent).unwrap_err(), RoomError::UnknownRoom(RoomId(9)));
        assert_eq!(network.merge(RoomId(1), RoomId(1), &mut Silent).unwrap_err(), RoomError::SameRoom(RoomId(1)));

        network.rooms[1].start_variant_count = 1;
        assert_eq!(
            network.merge(RoomId(0), RoomId(1), &mut Silent).unwrap_err(),
            RoomError::MultipleStartRooms { first: RoomId(0), second: RoomId(1) }
        );
    }

    #[test]
    fn merge_respects_state_limit() {
        let board = BoardBuilder::parse(CORRIDOR).build().unwrap();
        let mut network = RoomNetwork::with_limits(board, Limits::default().with_max_states(1)).unwrap();

        assert_eq!(
            network.merge(RoomId(0), RoomId(1), &mut Silent).unwrap_err(),
            RoomError::LimitExceeded { what: "product state", count: 2, limit: 1 }
        );
        assert_eq!(network.len(), 4);
    }

    #[test]
    fn merge_start_room() {
        let mut network = corridor();
        let id = network.merge(RoomId(0), RoomId(1), &mut Silent).unwrap();
        assert_eq!(id, RoomId(0));
        assert_eq!(network.len(), 3);

        let merged = network.room(id).unwrap();
        assert_eq!(merged.positions(), &[7, 8]);
        // the box can never be parked on cell 8, so only the empty state survives
        assert_eq!(merged.states().len(), 1);
        assert_eq!(merged.portals().len(), 1);
        assert_eq!(merged.start_variant_count(), 1);

        let start = merged.variant(merged.start_variants().next().unwrap());
        assert_eq!((start.moves, start.pushes, start.path.as_str()), (2, 0, "rr"));
        assert_eq!(start.exit, Some(PortalId(0)));

        // the box cell is renumbered and linked to the merged room
        let boxed = network.room(RoomId(1)).unwrap();
        assert_eq!(boxed.positions(), &[9]);
        assert_eq!(boxed.portal(PortalId(0)).from_room, RoomId(0));
        assert_eq!(boxed.portal(PortalId(1)).from_room, RoomId(2));
    }

    #[test]
    fn merge_start_room_against_box_room() {
        let mut network = corridor();
        network.merge(RoomId(0), RoomId(1), &mut Silent).unwrap();
        let id = network.merge(RoomId(0), RoomId(1), &mut Silent).unwrap();

        let merged = network.room(id).unwrap();
        assert_eq!(merged.states().len(), 2);
        assert_eq!(merged.states().get(StateId(0)), &[] as &[usize]);
        assert_eq!(merged.states().get(merged.start_state()), &[9]);
        assert_eq!(merged.variants().len(), 1);

        let terminal = merged.variant(merged.start_variants().next().unwrap());
        assert!(terminal.is_terminal());
        assert_eq!((terminal.moves, terminal.pushes), (2, 1));
        assert_eq!(terminal.exited_boxes, vec![PortalId(0)]);
        assert_eq!(terminal.new_state, StateId::SOLVED);
    }

    #[test]
    fn corridor_solution() {
        let mut network = corridor();
        merge_all(&mut network);

        let room = &network.rooms()[0];
        assert_eq!(room.positions(), &[7, 8, 9, 10]);
        assert_eq!(room.states().len(), 2);
        assert_eq!(room.states().get(StateId::SOLVED), &[10]);
        assert_eq!(room.states().get(room.start_state()), &[9]);
        assert_eq!(room.variants().len(), 1);

        let solution = network.best_solution().unwrap();
        assert_eq!(solution.path, "rr");
        assert_eq!((solution.moves, solution.pushes), (2, 1));
        assert!(solution.exited_boxes.is_empty());
    }

    #[test]
    fn merge_is_order_independent() {
        let mut forward = corridor();
        let mut backward = corridor();

        for (a, b) in [(0, 1), (0, 1)] {
            let left = forward.merge(RoomId(a), RoomId(b), &mut Silent).unwrap();
            let right = backward.merge(RoomId(b), RoomId(a), &mut Silent).unwrap();
            assert_eq!(left, right);
            assert_eq!(variants_of(&forward, left), variants_of(&backward, right));
            assert_eq!(
                forward.room(left).unwrap().states().iter().map(|(_, s)| s.to_vec()).collect_vec(),
                backward.room(right).unwrap().states().iter().map(|(_, s)| s.to_vec()).collect_vec()
            );
        }
    }

    #[test]
    fn merged_room_invariants() {
        let mut network = corridor();
        for _ in 0..2 {
            let product = network.rooms()[0].states().len() * network.rooms()[1].states().len();
            network.merge(RoomId(0), RoomId(1), &mut Silent).unwrap();
            assert!(network.rooms()[0].states().len() <= product);
        }

        for room in network.rooms() {
            // every state decodes back to itself
            for (id, boxes) in room.states().iter() {
                assert_eq!(room.states().find(boxes), Some(id));
            }

            for portal in room.portals() {
                let spans = portal.spans.spans();
                for (state, span) in &spans {
                    assert!(span.ids().all(|v| room.variant(v).old_state == *state));
                }
                for ((_, a), (_, b)) in spans.iter().tuple_combinations() {
                    let (a, b) = (a.start.index()..a.start.index() + a.count, b.start.index()..b.start.index() + b.count);
                    assert!(a.end <= b.start || b.end <= a.start);
                }
            }
        }
    }

    #[test]
    fn compaction_is_idempotent() {
        let mut network = corridor();
        let id = network.merge(RoomId(0), RoomId(1), &mut Silent).unwrap();

        let mut room = network.room(id).unwrap().clone();
        let variants = room.variants().len();
        assert_eq!(compact(&mut room).unwrap(), 0);
        assert_eq!(room.variants().len(), variants);
    }

    #[test]
    fn scan_keeps_useful_variants() {
        let mut network = corridor();
        assert_eq!(network.scan_deadlocks(RoomId(2), &mut Silent).unwrap(), 0);
        assert_eq!(network.room(RoomId(2)).unwrap().variants().len(), 5);
        assert_eq!(network.scan_deadlocks(RoomId(3), &mut Silent).unwrap(), 0);
        assert_eq!(network.scan_deadlocks(RoomId(7), &mut Silent).unwrap_err(), RoomError::UnknownRoom(RoomId(7)));
    }

    #[test]
    fn scan_removes_unreachable_pushes() {
        let mut network = corridor();
        // no box can ever enter cell 8 any more
        network.rooms[1].portals[1].swap = StateBoxSwap::default();

        assert_eq!(network.scan_deadlocks(RoomId(1), &mut Silent).unwrap(), 2);
        let room = network.room(RoomId(1)).unwrap();
        assert_eq!(room.states().len(), 1);
        assert_eq!(room.variants().len(), 2);
        assert!(room.variants().iter().all(|(_, v)| v.is_pure_move()));

        assert_eq!(network.scan_deadlocks(RoomId(1), &mut Silent).unwrap(), 0);
    }

    #[test]
    fn scan_is_monotone() {
        let mut network = corridor();
        let before = network.rooms().iter().map(|room| room.variants().len()).collect_vec();
        network.scan_all(&mut Silent).unwrap();
        let after = network.rooms().iter().map(|room| room.variants().len()).collect_vec();

        assert!(before.iter().zip(&after).all(|(b, a)| a <= b));
        assert_eq!(network.scan_all(&mut Silent).unwrap(), 0);
    }

    #[test]
    fn cancelled_forward_scan_leaves_room_untouched() {
        let mut network = corridor();
        let before = variants_of(&network, RoomId(2));

        let result = network.scan_deadlocks(RoomId(2), &mut |status: &str| !status.starts_with("scan forward"));
        assert_eq!(result.unwrap_err(), RoomError::Cancelled { phase: "scan forward", processed: 0 });
        assert_eq!(variants_of(&network, RoomId(2)), before);
    }

    #[test]
    fn cancelled_merge_leaves_network_untouched() {
        let mut network = corridor();
        let mut reports = Vec::new();

        let result = network.merge(RoomId(0), RoomId(1), &mut |status: &str| {
            reports.push(status.to_string());
            false
        });
        assert_eq!(result.unwrap_err(), RoomError::Cancelled { phase: "merge states", processed: 0 });
        assert_eq!(reports, vec!["merge states: 0".to_string()]);
        assert_eq!(network.len(), 4);
        network.validate().unwrap();
    }

    #[test]
    fn solve_with_turns() {
        let board = BoardBuilder::parse("#####
#@  #
# $ #
#  .#
#####").build().unwrap();
        let mut network = RoomNetwork::from_board(board).unwrap();
        assert_eq!(network.len(), 9);

        network.scan_all(&mut Silent).unwrap();
        merge_all(&mut network);

        let solution = network.best_solution().unwrap();
        assert_eq!((solution.moves, solution.pushes), (5, 2));
        assert_eq!(solution.path.len(), 5);
    }

    #[test]
    fn solve_two_boxes() {
        let board = BoardBuilder::parse(TWO_BOXES).build().unwrap();
        let mut network = RoomNetwork::from_board(board).unwrap();

        network.scan_all(&mut Silent).unwrap();
        merge_all(&mut network);

        let solution = network.best_solution().unwrap();
        assert_eq!((solution.moves, solution.pushes), (6, 3));
        assert_eq!(solution.path.len(), 6);
    }

    #[test]
    fn occupied_neighbor_cannot_take_a_box() {
        let board = BoardBuilder::parse(TWO_BOXES).build().unwrap();
        let mut network = RoomNetwork::from_board(board).unwrap();
        let id = network.merge(RoomId(3), RoomId(4), &mut Silent).unwrap();

        let room = network.room(id).unwrap();
        let portal = room.portals().iter().find(|portal| portal.from_pos == 13 && portal.to_pos == 12).unwrap();

        // with 11 empty the box on 12 can be pushed over
        let one = room.states().find(&[12]).unwrap();
        assert_eq!(portal.spans.variants(one).count(), 3);
        assert!(portal.spans.variants(one).all(|v| room.variant(v).new_state == room.states().find(&[11]).unwrap()));

        // with both cells full the push is impossible
        let both = room.states().find(&[11, 12]).unwrap();
        assert_eq!(room.start_state(), both);
        assert!(!portal.spans.has_variants(both));
    }

    #[test]
    fn merge_box_onto_goal_and_back() {
        let variants = entered_with_box(&merge_floor_and_box(|_| {}));

        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].path, "rll");
        assert_eq!((variants[0].moves, variants[0].pushes), (3, 1));
        assert_eq!(variants[0].exit, Some(PortalId(0)));
        assert_eq!(variants[0].exited_boxes, vec![PortalId(1)]);
        assert!(variants[1].is_terminal());
    }

    #[test]
    fn player_cannot_follow_box_into_blocked_cell() {
        let room = merge_floor_and_box(|variant| {
            assert_eq!((variant.exit, variant.exited_boxes.as_slice()), (Some(PortalId(0)), &[PortalId(1)][..]));
            variant.exit = Some(PortalId(1));
            variant.path = "r".to_string();
        });

        let variants = entered_with_box(&room);
        assert_eq!(variants.len(), 1);
        assert!(variants[0].is_terminal());
        assert!(room.variants().iter().all(|(_, v)| v.exit.map_or(true, |exit| !v.exited_boxes.contains(&exit))));
    }

    #[test]
    fn second_box_through_one_portal_is_rejected() {
        let room = merge_floor_and_box(|variant| {
            variant.exited_boxes = vec![PortalId(1), PortalId(1)];
            variant.pushes = 2;
        });

        let variants = entered_with_box(&room);
        assert_eq!(variants.len(), 1);
        assert!(variants[0].is_terminal());
    }

    #[test]
    fn merge_respects_variant_limit() {
        let board = BoardBuilder::parse(CORRIDOR).build().unwrap();
        let mut network = RoomNetwork::with_limits(board, Limits::default().with_max_variants(0)).unwrap();

        assert_eq!(
            network.merge(RoomId(1), RoomId(2), &mut Silent).unwrap_err(),
            RoomError::LimitExceeded { what: "variant", count: 6, limit: 0 }
        );
        assert_eq!(network.len(), 4);
        network.validate().unwrap();
    }

    #[test]
    fn limits() {
        assert_eq!(Limits::default().with_tick_interval(0).tick_interval, 1);
        let unbounded = Limits::unbounded();
        assert_eq!((unbounded.max_states, unbounded.max_variants), (usize::MAX, usize::MAX));
        assert_eq!(unbounded.tick_interval, Limits::default().tick_interval);
    }

    #[test]
    fn unbounded_corridor_solution() {
        let board = BoardBuilder::parse(CORRIDOR).build().unwrap();
        let mut network = RoomNetwork::with_limits(board, Limits::unbounded().with_tick_interval(1)).unwrap();
        merge_all(&mut network);

        assert_eq!(network.best_solution().unwrap().path, "rr");
    }

    #[test]
    fn progress_polls_every_tick() {
        let board = BoardBuilder::parse(CORRIDOR).build().unwrap();
        let mut network = RoomNetwork::with_limits(board, Limits::default().with_tick_interval(1)).unwrap();
        let mut reports = Vec::new();

        network.scan_deadlocks(RoomId(2), &mut |status: &str| {
            reports.push(status.to_string());
            true
        }).unwrap();
        assert!(reports.iter().any(|status| status.starts_with("build reverse map")));
        assert!(reports.iter().filter(|status| status.starts_with("scan forward")).count() > 1);
        assert!(reports.iter().any(|status| status.starts_with("scan backward")));
    }

    #[test]
    fn cancelled_backward_scan_leaves_room_untouched() {
        let mut network = corridor();
        let before = variants_of(&network, RoomId(2));

        let result = network.scan_deadlocks(RoomId(2), &mut |status: &str| !status.starts_with("scan backward"));
        assert_eq!(result.unwrap_err(), RoomError::Cancelled { phase: "scan backward", processed: 0 });
        assert_eq!(variants_of(&network, RoomId(2)), before);
    }

    #[test]
    fn variant_display() {
        let network = corridor();
        let floor = network.room(RoomId(1)).unwrap();
        assert_eq!(format!("{}", floor.variant(VariantId(1))), "1 -> 0, 1 moves, 1 pushes, path l, boxes out 1, exit 0");

        let mut network = corridor();
        merge_all(&mut network);
        assert_eq!(format!("{}", network.best_solution().unwrap()), "1 -> 0, 2 moves, 1 pushes, path rr, finish");
    }

    #[test]
    fn render_state() {
        let network = corridor();
        let boxed = network.room(RoomId(2)).unwrap();
        assert_eq!(boxed.render_state(network.board(), StateId(1)), "######
#--$-#
######
");

        let mut network = corridor();
        merge_all(&mut network);
        let room = &network.rooms()[0];
        assert_eq!(room.render_state(network.board(), room.start_state()), "######
#  $.#
######
");
        assert_eq!(room.render_state(network.board(), StateId::SOLVED), "######
#   *#
######
");
    }

    #[test]
    fn fingerprint_is_order_sensitive() {
        assert_eq!(Fingerprint::new().value(), 0xcbf29ce484222325);
        assert_ne!(Fingerprint::new().mix(1).mix(2), Fingerprint::new().mix(2).mix(1));
        assert_eq!(Fingerprint::new().mix_all([3, 4]), Fingerprint::new().mix(3).mix(4));
    }

    proptest! {
        #[test]
        fn state_catalog_is_a_bijection(sets in prop::collection::vec(prop::collection::btree_set(0usize..64, 0..6), 1..40)) {
            let mut catalog = StateCatalog::new();
            let ids = sets.iter()
                .map(|set| catalog.insert(&set.iter().copied().collect_vec()))
                .collect_vec();

            for (set, id) in sets.iter().zip(&ids) {
                let boxes = set.iter().copied().collect_vec();
                prop_assert_eq!(catalog.get(*id), boxes.as_slice());
                prop_assert_eq!(catalog.find(&boxes), Some(*id));
            }
            prop_assert_eq!(catalog.len(), sets.iter().collect::<BTreeSet<_>>().len());
        }

        #[test]
        fn path_compression_restores_paths(path in "[udlr]{0,40}") {
            prop_assert_eq!(uncompress_path(&compress_path(&path)), path);
        }
    }
}
