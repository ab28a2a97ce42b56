use crate::{GraphError, GraphStore, NodePatch, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

/// Fire-and-forget user feedback channel. The controller never inspects the
/// sink's result; presentation (toast, console, test capture) is up to the
/// implementation.
pub trait NotificationSink {
    fn notify(&mut self, kind: NoticeKind, message: &str);
}

#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl NotificationSink for ConsoleNotifier {
    fn notify(&mut self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Error => eprintln!("error: {message}"),
            NoticeKind::Info | NoticeKind::Success => println!("{message}"),
        }
    }
}

/// Captures notifications instead of displaying them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub notices: Vec<(NoticeKind, String)>,
}

impl NotificationSink for RecordingNotifier {
    fn notify(&mut self, kind: NoticeKind, message: &str) {
        self.notices.push((kind, message.to_string()));
    }
}

/// Single-active-drag state machine for moving a node on the canvas.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        node: String,
        grab: Point,
    },
}

/// Connect-gesture state machine: one optional pending source.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConnectState {
    #[default]
    Idle,
    AwaitingTarget {
        source: String,
    },
}

/// An in-flight palette drag: the kind being dragged and the grab offset
/// inside the palette card, so the drop lands where the pointer released.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteDrag {
    pub kind: String,
    pub grab: Point,
}

/// Translates raw pointer/drag/keyboard events into store operations. Holds
/// no canonical state of its own, only the transient gesture machines.
pub struct InteractionController<N: NotificationSink> {
    drag: DragState,
    connect: ConnectState,
    palette: Option<PaletteDrag>,
    library_open: bool,
    notifier: N,
}

impl<N: NotificationSink> InteractionController<N> {
    pub fn new(notifier: N) -> Self {
        Self {
            drag: DragState::Idle,
            connect: ConnectState::Idle,
            palette: None,
            library_open: false,
            notifier,
        }
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    pub fn pending_source(&self) -> Option<&str> {
        match &self.connect {
            ConnectState::AwaitingTarget { source } => Some(source),
            ConnectState::Idle => None,
        }
    }

    pub fn is_library_open(&self) -> bool {
        self.library_open
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Pointer pressed over a node: capture the pointer-to-node offset so
    /// movement stays frame-accurate, then run the click protocol (complete
    /// a pending connection or select).
    pub fn pointer_down(&mut self, store: &mut GraphStore, node_id: &str, pointer: Point) {
        let Some(node) = store.workflow().node(node_id) else {
            return;
        };

        let grab = Point::new(pointer.x - node.position.x, pointer.y - node.position.y);
        self.drag = DragState::Dragging {
            node: node_id.to_string(),
            grab,
        };
        self.node_clicked(store, node_id);
    }

    pub fn pointer_move(&mut self, store: &mut GraphStore, pointer: Point) {
        if let DragState::Dragging { node, grab } = &self.drag {
            let position = Point::new(pointer.x - grab.x, pointer.y - grab.y);
            // The node can vanish mid-drag (delete from the config panel).
            let _ = store.update_node(node, NodePatch::position(position));
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Arms `node_id` as the pending source of a connect gesture
    /// (Ctrl+click / context gesture on a node).
    pub fn begin_connection(&mut self, store: &GraphStore, node_id: &str) {
        if store.workflow().has_node(node_id) {
            self.connect = ConnectState::AwaitingTarget {
                source: node_id.to_string(),
            };
        }
    }

    /// Plain click on a node: completes a pending connection, or selects.
    /// Clicking the armed source itself just disarms the gesture.
    pub fn node_clicked(&mut self, store: &mut GraphStore, node_id: &str) {
        match std::mem::take(&mut self.connect) {
            ConnectState::AwaitingTarget { source } => {
                if source == node_id {
                    return;
                }
                match store.add_connection(&source, node_id) {
                    Ok(_) => {}
                    // Resubmitting an existing edge is not worth a toast.
                    Err(GraphError::DuplicateConnection { .. }) => {}
                    Err(err) => self.notifier.notify(NoticeKind::Error, &err.to_string()),
                }
            }
            ConnectState::Idle => {
                let _ = store.select_node(Some(node_id));
            }
        }
    }

    pub fn background_clicked(&mut self, store: &mut GraphStore) {
        let _ = store.select_node(None);
        self.connect = ConnectState::Idle;
        self.library_open = false;
    }

    pub fn escape_pressed(&mut self) {
        self.connect = ConnectState::Idle;
    }

    pub fn toggle_library(&mut self) {
        self.library_open = !self.library_open;
    }

    pub fn open_library(&mut self) {
        self.library_open = true;
    }

    pub fn close_library(&mut self) {
        self.library_open = false;
    }

    pub fn palette_drag_started(&mut self, kind: &str, grab: Point) {
        self.palette = Some(PaletteDrag {
            kind: kind.to_string(),
            grab,
        });
    }

    pub fn palette_drag_ended(&mut self) {
        self.palette = None;
    }

    /// Drop from the palette onto the canvas. The node lands at the pointer
    /// position translated to canvas coordinates minus the grab offset. A
    /// pending connect source is consumed to create-and-connect in one step.
    pub fn palette_dropped(
        &mut self,
        store: &mut GraphStore,
        pointer: Point,
        canvas_origin: Point,
    ) -> Option<String> {
        let drag = self.palette.take()?;
        let position = Point::new(
            pointer.x - canvas_origin.x - drag.grab.x,
            pointer.y - canvas_origin.y - drag.grab.y,
        );
        Some(self.create_node(store, &drag.kind, position))
    }

    /// Palette entry picked by click rather than drag; the caller chooses
    /// the spawn position (for example, offset from the pending source).
    pub fn palette_entry_picked(
        &mut self,
        store: &mut GraphStore,
        kind: &str,
        position: Point,
    ) -> String {
        self.create_node(store, kind, position)
    }

    pub fn run_requested(&mut self, store: &GraphStore) {
        if store.workflow().nodes.is_empty() {
            self.notifier
                .notify(NoticeKind::Error, "Add nodes to your workflow before executing");
        } else {
            self.notifier
                .notify(NoticeKind::Success, "Workflow execution started");
        }
    }

    pub fn stop_requested(&mut self) {
        self.notifier
            .notify(NoticeKind::Info, "Workflow execution stopped");
    }

    pub fn save_requested(&mut self) {
        self.notifier
            .notify(NoticeKind::Success, "Workflow saved successfully");
    }

    fn create_node(&mut self, store: &mut GraphStore, kind: &str, position: Point) -> String {
        let source = match std::mem::take(&mut self.connect) {
            ConnectState::AwaitingTarget { source } => Some(source),
            ConnectState::Idle => None,
        };
        store.add_node_linked(kind, position, source.as_deref())
    }
}
