//! Evaluation of a transformation tree against one concrete packet.
//!
//! Evaluation walks the tree over a lazy sequence of in-flight states. `ApplyAny` is the only
//! step that forks a state; every other step rewrites the state it is given. After the steps of
//! a tree node have run, the changes are folded into the trace, and only then does the rewritten
//! packet become visible to the guards further down the tree.

use crate::acl::GuardContext;
use crate::error::TransformationError;
use crate::header::{FieldValue, FlowField, Packet, PortField};
use crate::transformation::{IpPool, Transformation, TransformationStep, TransformationType};
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::iter;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// The transformation matched but left every field as it was.
    Permitted,
    Transformed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDiff {
    pub field: FlowField,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
}

impl fmt::Display for FlowDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.old_value, self.new_value)
    }
}

/// One entry of a transformation trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceStep {
    pub ty: TransformationType,
    pub action: StepAction,
    pub diffs: Vec<FlowDiff>,
}

impl fmt::Display for TraceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            StepAction::Permitted => write!(f, "{} permitted", self.ty),
            StepAction::Transformed => {
                write!(f, "{} transformed:", self.ty)?;
                for (i, diff) in self.diffs.iter().enumerate() {
                    write!(f, "{}{}", if i == 0 { " " } else { ", " }, diff)?;
                }
                Ok(())
            }
        }
    }
}

/// The outcome of one evaluation branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationResult {
    pub packet: Packet,
    pub trace: Vec<TraceStep>,
}

/// The state of one evaluation branch.
#[derive(Debug, Clone)]
struct TransformationState {
    /// The packet being rewritten.
    packet: Packet,
    /// The packet guards are evaluated against; catches up with `packet` at each checkpoint.
    snapshot: Packet,
    /// Diffs per transformation type since the last checkpoint, in the order the types were first touched.
    pending: Vec<(TransformationType, Vec<FlowDiff>)>,
    trace: Vec<TraceStep>,
}

impl TransformationState {
    fn new(packet: Packet) -> Self {
        TransformationState {
            snapshot: packet.clone(),
            packet,
            pending: vec![],
            trace: vec![],
        }
    }

    fn touch(&mut self, ty: TransformationType) -> &mut Vec<FlowDiff> {
        let index = match self.pending.iter().position(|(t, _)| *t == ty) {
            Some(index) => index,
            None => {
                self.pending.push((ty, vec![]));
                self.pending.len() - 1
            }
        };
        &mut self.pending[index].1
    }

    /// Records a field change. A type's first change to a field fixes the diff's old value;
    /// later changes only move its new value.
    fn record(&mut self, ty: TransformationType, field: FlowField, old: FieldValue, new: FieldValue) {
        let diffs = self.touch(ty);
        match diffs.iter_mut().find(|d| d.field == field) {
            Some(diff) => diff.new_value = new,
            None => diffs.push(FlowDiff {
                field,
                old_value: old,
                new_value: new,
            }),
        }
    }

    /// Diffs are measured against the packet as it leaves the node, so a type whose field
    /// was later overwritten by another type still reports where the field ended up.
    fn checkpoint(mut self) -> Self {
        let packet = &self.packet;
        for (ty, mut diffs) in self.pending.drain(..) {
            diffs.retain_mut(|diff| {
                if let Some(value) = packet.flow_value(diff.field) {
                    diff.new_value = value;
                }
                diff.old_value != diff.new_value
            });
            let action = if diffs.is_empty() {
                StepAction::Permitted
            } else {
                StepAction::Transformed
            };
            self.trace.push(TraceStep { ty, action, diffs });
        }
        let changed = self.packet != self.snapshot;
        if changed {
            self.snapshot = self.packet.clone();
        }
        tracing::trace!(trace_len = self.trace.len(), changed, "trace checkpoint");
        self
    }

    fn into_result(self) -> TransformationResult {
        debug_assert!(self.pending.is_empty(), "unflushed diffs at end of evaluation");
        TransformationResult {
            packet: self.packet,
            trace: self.trace,
        }
    }
}

type Outcomes<'s> = Box<dyn Iterator<Item = Result<TransformationState, TransformationError>> + 's>;

fn single<'s>(outcome: Result<TransformationState, TransformationError>) -> Outcomes<'s> {
    Box::new(iter::once(outcome))
}

/// Evaluates transformation trees in a fixed guard context.
pub struct TransformationEvaluator<'a> {
    ctx: GuardContext<'a>,
    steps_applied: Cell<usize>,
}

impl<'a> TransformationEvaluator<'a> {
    pub fn new(ctx: GuardContext<'a>) -> Self {
        TransformationEvaluator {
            ctx,
            steps_applied: Cell::new(0),
        }
    }

    /// Number of primitive steps applied so far, across all evaluations.
    pub fn steps_applied(&self) -> usize {
        self.steps_applied.get()
    }

    /// All outcomes, one per `ApplyAny` choice, produced on demand.
    /// A failing branch yields its error and the remaining branches still run.
    pub fn eval_all<'s>(
        &'s self,
        transformation: &'s Transformation,
        packet: Packet,
    ) -> impl Iterator<Item = Result<TransformationResult, TransformationError>> + 's {
        tracing::debug!(packet = %packet, "evaluating transformation");
        let states = single(Ok(TransformationState::new(packet)));
        self.eval_node(Some(transformation), states)
            .map(|outcome| outcome.map(TransformationState::into_result))
    }

    /// The first outcome only; later `ApplyAny` choices are never computed.
    pub fn eval(
        &self,
        transformation: &Transformation,
        packet: Packet,
    ) -> Result<TransformationResult, TransformationError> {
        self.eval_all(transformation, packet)
            .next()
            .unwrap_or(Err(TransformationError::NoOutcome))
    }

    fn eval_node<'s>(&'s self, node: Option<&'s Transformation>, states: Outcomes<'s>) -> Outcomes<'s> {
        let Some(node) = node else {
            return states;
        };
        Box::new(states.flat_map(move |outcome| -> Outcomes<'s> {
            let state = match outcome {
                Ok(state) => state,
                Err(e) => return single(Err(e)),
            };
            let holds = match &node.guard {
                None => true,
                Some(guard) => match self.ctx.matches(guard, &state.snapshot) {
                    Ok(holds) => holds,
                    Err(e) => return single(Err(e.into())),
                },
            };
            if holds {
                let applied = self
                    .apply_steps(&node.steps, state)
                    .map(|outcome| outcome.map(TransformationState::checkpoint));
                self.eval_node(node.and_then.as_deref(), Box::new(applied))
            } else {
                self.eval_node(node.or_else.as_deref(), single(Ok(state)))
            }
        }))
    }

    fn apply_steps<'s>(&'s self, steps: &'s [TransformationStep], state: TransformationState) -> Outcomes<'s> {
        steps.iter().fold(single(Ok(state)), |states, step| {
            Box::new(states.flat_map(move |outcome| match outcome {
                Ok(state) => self.apply_step(step, state),
                Err(e) => single(Err(e)),
            }))
        })
    }

    fn apply_step<'s>(&'s self, step: &'s TransformationStep, mut state: TransformationState) -> Outcomes<'s> {
        match step {
            TransformationStep::ApplyAll(steps) => self.apply_steps(steps, state),
            TransformationStep::ApplyAny(steps) => {
                if steps.is_empty() {
                    return single(Err(TransformationError::EmptyApplyAny));
                }
                Box::new(
                    steps
                        .iter()
                        .flat_map(move |step| self.apply_step(step, state.clone())),
                )
            }
            TransformationStep::AssignIpAddressFromPool { ty, field, pool } => {
                self.count_step();
                single(assign_ip(&mut state, *ty, *field, pool).map(|()| state))
            }
            TransformationStep::ShiftIpAddressIntoSubnet { ty, field, subnet } => {
                self.count_step();
                let old = state.packet.ip(*field);
                let new = shift_into_subnet(old, *subnet);
                state.packet.set_ip(*field, new);
                state.record(*ty, (*field).into(), FieldValue::Ip(old), FieldValue::Ip(new));
                tracing::trace!(%ty, %old, %new, "shifted address into {}", subnet);
                single(Ok(state))
            }
            TransformationStep::AssignPortFromPool {
                ty,
                field,
                start,
                end,
            } => {
                self.count_step();
                single(assign_port(&mut state, *ty, *field, *start, *end).map(|()| state))
            }
            TransformationStep::Noop { ty } => {
                self.count_step();
                state.touch(*ty);
                single(Ok(state))
            }
        }
    }

    fn count_step(&self) {
        self.steps_applied.set(self.steps_applied.get() + 1);
    }
}

fn assign_ip(
    state: &mut TransformationState,
    ty: TransformationType,
    field: crate::header::IpField,
    pool: &IpPool,
) -> Result<(), TransformationError> {
    let new = pool.representative()?;
    let old = state.packet.ip(field);
    state.packet.set_ip(field, new);
    state.record(ty, field.into(), FieldValue::Ip(old), FieldValue::Ip(new));
    tracing::trace!(%ty, %old, %new, "assigned address from pool");
    Ok(())
}

fn assign_port(
    state: &mut TransformationState,
    ty: TransformationType,
    field: PortField,
    start: u16,
    end: u16,
) -> Result<(), TransformationError> {
    if start > end {
        return Err(TransformationError::MalformedPortPool { start, end });
    }
    let old = state
        .packet
        .port(field)
        .ok_or(TransformationError::MissingPort(field))?;
    state.packet.set_port(field, start);
    state.record(ty, field.into(), FieldValue::Port(old), FieldValue::Port(start));
    tracing::trace!(%ty, old, new = start, "assigned port from pool");
    Ok(())
}

/// Keeps the host bits of `ip` relative to the subnet's prefix length and swaps in the subnet's network bits.
pub fn shift_into_subnet(ip: Ipv4Addr, subnet: Ipv4Network) -> Ipv4Addr {
    let mask = u32::from(subnet.mask());
    let base = u32::from(subnet.network());
    Ipv4Addr::from((base & mask) | (u32::from(ip) & !mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{MatchExpr, NamedAcls};
    use crate::header::IpField;
    use crate::ip_space::{IpSpace, NamedIpSpaces};
    use crate::transformation::TransformationType::{DestNat, SourceNat, StaticNat};

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    fn net(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    fn packet(dst: &str) -> Packet {
        Packet::tcp(ip("172.16.0.1"), 40000, ip(dst), 80)
    }

    fn with_evaluator<R>(f: impl FnOnce(&TransformationEvaluator) -> R) -> R {
        let acls = NamedAcls::new();
        let spaces = NamedIpSpaces::new();
        let evaluator = TransformationEvaluator::new(GuardContext::new(&acls, &spaces));
        f(&evaluator)
    }

    fn dest_nat_example() -> Transformation {
        Transformation::when(
            MatchExpr::dst_ip(IpSpace::prefix(net("10.0.0.0/24"))),
            vec![TransformationStep::assign_ip(
                DestNat,
                IpField::Destination,
                IpPool::single(ip("10.0.0.5")),
            )],
        )
    }

    #[test]
    fn test_guard_holds_rewrites_destination() {
        with_evaluator(|ev| {
            let result = ev.eval(&dest_nat_example(), packet("10.0.0.7")).unwrap();
            assert_eq!(result.packet.dst_ip, ip("10.0.0.5"));
            assert_eq!(
                result.trace,
                vec![TraceStep {
                    ty: DestNat,
                    action: StepAction::Transformed,
                    diffs: vec![FlowDiff {
                        field: FlowField::DstIp,
                        old_value: FieldValue::Ip(ip("10.0.0.7")),
                        new_value: FieldValue::Ip(ip("10.0.0.5")),
                    }],
                }]
            );
            assert_eq!(
                result.trace[0].to_string(),
                "DEST_NAT transformed: dstIp: 10.0.0.7 -> 10.0.0.5"
            );
        });
    }

    #[test]
    fn test_guard_fails_is_identity() {
        with_evaluator(|ev| {
            let input = packet("192.168.1.1");
            let result = ev.eval(&dest_nat_example(), input.clone()).unwrap();
            assert_eq!(result.packet, input);
            assert!(result.trace.is_empty());
            assert_eq!(ev.steps_applied(), 0);
        });
    }

    #[test]
    fn test_apply_all_matches_manual_application() {
        with_evaluator(|ev| {
            let t = Transformation::always(vec![TransformationStep::apply_all(vec![
                TransformationStep::shift_ip(DestNat, IpField::Destination, net("192.168.0.0/16")),
                TransformationStep::assign_port(DestNat, PortField::Destination, 8080, 8090),
            ])]);
            let result = ev.eval(&t, packet("10.1.2.3")).unwrap();

            let mut expected = packet("10.1.2.3");
            expected.set_ip(
                IpField::Destination,
                shift_into_subnet(expected.dst_ip, net("192.168.0.0/16")),
            );
            expected.set_port(PortField::Destination, 8080);
            assert_eq!(result.packet, expected);
            assert_eq!(result.packet.dst_ip, ip("192.168.2.3"));
            assert_eq!(result.trace.len(), 1);
            assert_eq!(result.trace[0].diffs.len(), 2);
        });
    }

    #[test]
    fn test_apply_all_is_order_sensitive() {
        with_evaluator(|ev| {
            let assign = TransformationStep::assign_ip(
                DestNat,
                IpField::Destination,
                IpPool::single(ip("10.0.0.5")),
            );
            let shift = TransformationStep::shift_ip(DestNat, IpField::Destination, net("192.168.0.0/16"));
            let forward = Transformation::always(vec![TransformationStep::apply_all(vec![
                assign.clone(),
                shift.clone(),
            ])]);
            let backward = Transformation::always(vec![TransformationStep::apply_all(vec![shift, assign])]);
            let a = ev.eval(&forward, packet("1.2.3.4")).unwrap();
            let b = ev.eval(&backward, packet("1.2.3.4")).unwrap();
            assert_eq!(a.packet.dst_ip, ip("192.168.0.5"));
            assert_eq!(b.packet.dst_ip, ip("10.0.0.5"));
        });
    }

    #[test]
    fn test_apply_any_forks_independent_branches() {
        with_evaluator(|ev| {
            let t = Transformation::always(vec![TransformationStep::apply_any(vec![
                TransformationStep::assign_ip(SourceNat, IpField::Source, IpPool::single(ip("1.1.1.1"))),
                TransformationStep::assign_port(SourceNat, PortField::Source, 2000, 3000),
                TransformationStep::shift_ip(DestNat, IpField::Destination, net("10.9.0.0/16")),
            ])]);
            let input = packet("10.0.0.7");
            let results: Vec<_> = ev.eval_all(&t, input.clone()).map(Result::unwrap).collect();
            assert_eq!(results.len(), 3);

            let mut first = input.clone();
            first.src_ip = ip("1.1.1.1");
            let mut second = input.clone();
            second.src_port = Some(2000);
            let mut third = input.clone();
            third.dst_ip = ip("10.9.0.7");
            assert_eq!(results[0].packet, first);
            assert_eq!(results[1].packet, second);
            assert_eq!(results[2].packet, third);
            for result in &results {
                assert_eq!(result.trace.len(), 1);
                assert_eq!(result.trace[0].diffs.len(), 1);
            }
        });
    }

    #[test]
    fn test_nested_apply_any_multiplies_branches() {
        with_evaluator(|ev| {
            let choice = |field| {
                TransformationStep::apply_any(vec![
                    TransformationStep::assign_port(StaticNat, field, 1, 1),
                    TransformationStep::assign_port(StaticNat, field, 2, 2),
                ])
            };
            let t = Transformation::always(vec![TransformationStep::apply_all(vec![
                choice(PortField::Source),
                choice(PortField::Destination),
            ])]);
            let ports: Vec<_> = ev
                .eval_all(&t, packet("10.0.0.7"))
                .map(|r| {
                    let p = r.unwrap().packet;
                    (p.src_port.unwrap(), p.dst_port.unwrap())
                })
                .collect();
            assert_eq!(ports, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
        });
    }

    #[test]
    fn test_unchanged_field_is_permitted() {
        with_evaluator(|ev| {
            let t = Transformation::always(vec![TransformationStep::assign_ip(
                DestNat,
                IpField::Destination,
                IpPool::single(ip("10.0.0.7")),
            )]);
            let input = packet("10.0.0.7");
            let result = ev.eval(&t, input.clone()).unwrap();
            assert_eq!(result.packet, input);
            assert_eq!(
                result.trace,
                vec![TraceStep {
                    ty: DestNat,
                    action: StepAction::Permitted,
                    diffs: vec![],
                }]
            );
            assert_eq!(result.trace[0].to_string(), "DEST_NAT permitted");
        });
    }

    #[test]
    fn test_rewrite_and_restore_is_permitted() {
        with_evaluator(|ev| {
            let t = Transformation::always(vec![
                TransformationStep::assign_ip(DestNat, IpField::Destination, IpPool::single(ip("9.9.9.9"))),
                TransformationStep::assign_ip(DestNat, IpField::Destination, IpPool::single(ip("10.0.0.7"))),
            ]);
            let result = ev.eval(&t, packet("10.0.0.7")).unwrap();
            assert_eq!(result.trace[0].action, StepAction::Permitted);
        });
    }

    #[test]
    fn test_interleaved_types_report_net_change() {
        with_evaluator(|ev| {
            let assign = |ty, dst| TransformationStep::assign_ip(ty, IpField::Destination, IpPool::single(ip(dst)));
            let t = Transformation::always(vec![
                assign(DestNat, "2.2.2.2"),
                assign(SourceNat, "3.3.3.3"),
                assign(DestNat, "1.1.1.1"),
                assign(SourceNat, "2.2.2.2"),
            ])
            .and_then(Transformation::when(
                MatchExpr::dst_ip(IpSpace::Ip(ip("2.2.2.2"))),
                vec![TransformationStep::noop(StaticNat)],
            ));
            let result = ev.eval(&t, packet("1.1.1.1")).unwrap();
            assert_eq!(result.packet.dst_ip, ip("2.2.2.2"));
            assert_eq!(
                result.trace,
                vec![
                    TraceStep {
                        ty: DestNat,
                        action: StepAction::Transformed,
                        diffs: vec![FlowDiff {
                            field: FlowField::DstIp,
                            old_value: FieldValue::Ip(ip("1.1.1.1")),
                            new_value: FieldValue::Ip(ip("2.2.2.2")),
                        }],
                    },
                    TraceStep {
                        ty: SourceNat,
                        action: StepAction::Permitted,
                        diffs: vec![],
                    },
                    TraceStep {
                        ty: StaticNat,
                        action: StepAction::Permitted,
                        diffs: vec![],
                    },
                ]
            );
        });
    }

    #[test]
    fn test_noops_leave_packet_untouched() {
        with_evaluator(|ev| {
            let t = Transformation::always(vec![
                TransformationStep::noop(SourceNat),
                TransformationStep::noop(DestNat),
                TransformationStep::noop(SourceNat),
            ]);
            let input = packet("10.0.0.7");
            let result = ev.eval(&t, input.clone()).unwrap();
            assert_eq!(result.packet, input);
            let types: Vec<_> = result.trace.iter().map(|s| (s.ty, s.action)).collect();
            assert_eq!(
                types,
                vec![(SourceNat, StepAction::Permitted), (DestNat, StepAction::Permitted)]
            );
        });
    }

    #[test]
    fn test_later_guards_see_rewritten_packet() {
        with_evaluator(|ev| {
            let t = dest_nat_example().and_then(
                Transformation::when(
                    MatchExpr::dst_ip(IpSpace::Ip(ip("10.0.0.5"))),
                    vec![TransformationStep::assign_ip(
                        SourceNat,
                        IpField::Source,
                        IpPool::single(ip("100.64.0.1")),
                    )],
                )
                .or_else(Transformation::always(vec![TransformationStep::noop(StaticNat)])),
            );
            let result = ev.eval(&t, packet("10.0.0.7")).unwrap();
            assert_eq!(result.packet.src_ip, ip("100.64.0.1"));
            let types: Vec<_> = result.trace.iter().map(|s| s.ty).collect();
            assert_eq!(types, vec![DestNat, SourceNat]);
        });
    }

    #[test]
    fn test_or_else_branch_taken_when_guard_fails() {
        with_evaluator(|ev| {
            let t = dest_nat_example().or_else(Transformation::always(vec![TransformationStep::noop(
                StaticNat,
            )]));
            let result = ev.eval(&t, packet("192.168.1.1")).unwrap();
            assert_eq!(result.trace.len(), 1);
            assert_eq!(result.trace[0].ty, StaticNat);
        });
    }

    #[test]
    fn test_eval_does_not_force_other_branches() {
        with_evaluator(|ev| {
            let alternatives = (0..1000)
                .map(|i| TransformationStep::assign_port(SourceNat, PortField::Source, i, i))
                .collect();
            let t = Transformation::always(vec![TransformationStep::apply_any(alternatives)]);
            let result = ev.eval(&t, packet("10.0.0.7")).unwrap();
            assert_eq!(result.packet.src_port, Some(0));
            assert_eq!(ev.steps_applied(), 1);

            assert_eq!(ev.eval_all(&t, packet("10.0.0.7")).count(), 1000);
            assert_eq!(ev.steps_applied(), 1001);
        });
    }

    #[test]
    fn test_errors_abort_only_their_branch() {
        with_evaluator(|ev| {
            let t = Transformation::always(vec![TransformationStep::apply_any(vec![
                TransformationStep::assign_port(DestNat, PortField::Destination, 80, 80),
                TransformationStep::assign_ip(DestNat, IpField::Destination, IpPool::single(ip("1.1.1.1"))),
            ])]);
            let icmp = Packet::icmp(ip("2.2.2.2"), ip("3.3.3.3"));
            let results: Vec<_> = ev.eval_all(&t, icmp).collect();
            assert_eq!(
                results[0],
                Err(TransformationError::MissingPort(PortField::Destination))
            );
            assert_eq!(results[1].as_ref().unwrap().packet.dst_ip, ip("1.1.1.1"));
        });
    }

    #[test]
    fn test_configuration_errors() {
        with_evaluator(|ev| {
            let undefined = Transformation::when(MatchExpr::permitted_by("missing"), vec![]);
            assert!(matches!(
                ev.eval(&undefined, packet("10.0.0.7")),
                Err(TransformationError::Guard(_))
            ));

            let empty_pool = Transformation::always(vec![TransformationStep::assign_ip(
                SourceNat,
                IpField::Source,
                IpPool { ranges: vec![] },
            )]);
            assert_eq!(
                ev.eval(&empty_pool, packet("10.0.0.7")),
                Err(TransformationError::EmptyIpPool)
            );

            let bad_ports = Transformation::always(vec![TransformationStep::assign_port(
                SourceNat,
                PortField::Source,
                10,
                5,
            )]);
            assert_eq!(
                ev.eval(&bad_ports, packet("10.0.0.7")),
                Err(TransformationError::MalformedPortPool { start: 10, end: 5 })
            );

            let no_choice = Transformation::always(vec![TransformationStep::apply_any(vec![])]);
            assert_eq!(
                ev.eval(&no_choice, packet("10.0.0.7")),
                Err(TransformationError::EmptyApplyAny)
            );
        });
    }

    #[test]
    fn test_shift_into_subnet() {
        assert_eq!(shift_into_subnet(ip("10.1.2.3"), net("192.168.0.0/16")), ip("192.168.2.3"));
        assert_eq!(shift_into_subnet(ip("10.1.2.3"), net("172.16.5.0/24")), ip("172.16.5.3"));
        assert_eq!(shift_into_subnet(ip("10.1.2.3"), net("0.0.0.0/0")), ip("10.1.2.3"));
        assert_eq!(shift_into_subnet(ip("10.1.2.3"), net("8.8.8.8/32")), ip("8.8.8.8"));
    }
}
