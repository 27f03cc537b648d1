use std::collections::BTreeMap;

use glam::Vec3;

/// Node holding the whole loaded model; drag and auto-rotation act on it.
pub const MODEL_NODE: &str = "saber";
/// Retractable sub-component animated by the toggle.
pub const BLADE_NODE: &str = "Blade";
pub const CAMERA_NODE: &str = "camera";

/// Placement applied to a node from the model state document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// Scene graph collaborator.
///
/// Node lookups are by name. Mutators return `false` when the node is not
/// present, which is a normal condition while the model is still loading.
pub trait Scene: Send {
    fn contains(&self, node: &str) -> bool;
    fn world_position(&self, node: &str) -> Option<Vec3>;
    /// Scale along the node's long axis; the value the blade toggle animates.
    fn node_scale(&self, node: &str) -> Option<f32>;
    fn set_node_scale(&mut self, node: &str, scale: f32) -> bool;
    fn is_visible(&self, node: &str) -> Option<bool>;
    fn set_visible(&mut self, node: &str, visible: bool) -> bool;
    fn set_emissive_intensity(&mut self, node: &str, intensity: f32) -> bool;
    fn set_transform(&mut self, node: &str, transform: NodeTransform) -> bool;
    /// Adds to the node's rotation (radians, yaw about Y and pitch about X).
    fn rotate(&mut self, node: &str, yaw: f32, pitch: f32) -> bool;
    fn camera_distance(&self) -> f32;
    fn set_camera_distance(&mut self, distance: f32);
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub transform: NodeTransform,
    pub visible: bool,
    pub emissive_intensity: f32,
}

impl Default for SceneNode {
    fn default() -> Self {
        Self {
            transform: NodeTransform::default(),
            visible: true,
            emissive_intensity: 0.0,
        }
    }
}

/// Flat in-memory scene. Node positions are world positions; there is no
/// parenting.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: BTreeMap<String, SceneNode>,
}

impl SceneGraph {
    /// Scene with only the camera, placed where the viewer starts.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        let mut camera = SceneNode::default();
        camera.transform.position = Vec3::new(0.0, 0.0, 100.0);
        nodes.insert(CAMERA_NODE.to_string(), camera);
        Self { nodes }
    }

    /// Scene populated the way a loaded saber model appears: a model root and
    /// its blade.
    pub fn with_saber() -> Self {
        let mut scene = Self::new();
        scene.insert(MODEL_NODE, SceneNode::default());
        scene.insert(BLADE_NODE, SceneNode::default());
        scene
    }

    pub fn insert(&mut self, name: impl Into<String>, node: SceneNode) {
        self.nodes.insert(name.into(), node);
    }

    pub fn remove(&mut self, name: &str) -> Option<SceneNode> {
        self.nodes.remove(name)
    }

    pub fn node(&self, name: &str) -> Option<&SceneNode> {
        self.nodes.get(name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        self.nodes.get_mut(name)
    }

    fn with_node(&mut self, name: &str, apply: impl FnOnce(&mut SceneNode)) -> bool {
        match self.nodes.get_mut(name) {
            Some(node) => {
                apply(node);
                true
            }
            None => false,
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for SceneGraph {
    fn contains(&self, node: &str) -> bool {
        self.nodes.contains_key(node)
    }

    fn world_position(&self, node: &str) -> Option<Vec3> {
        self.nodes.get(node).map(|n| n.transform.position)
    }

    fn node_scale(&self, node: &str) -> Option<f32> {
        self.nodes.get(node).map(|n| n.transform.scale.z)
    }

    fn set_node_scale(&mut self, node: &str, scale: f32) -> bool {
        self.with_node(node, |n| n.transform.scale.z = scale)
    }

    fn is_visible(&self, node: &str) -> Option<bool> {
        self.nodes.get(node).map(|n| n.visible)
    }

    fn set_visible(&mut self, node: &str, visible: bool) -> bool {
        self.with_node(node, |n| n.visible = visible)
    }

    fn set_emissive_intensity(&mut self, node: &str, intensity: f32) -> bool {
        self.with_node(node, |n| n.emissive_intensity = intensity)
    }

    fn set_transform(&mut self, node: &str, transform: NodeTransform) -> bool {
        self.with_node(node, |n| n.transform = transform)
    }

    fn rotate(&mut self, node: &str, yaw: f32, pitch: f32) -> bool {
        self.with_node(node, |n| {
            n.transform.rotation.y += yaw;
            n.transform.rotation.x += pitch;
        })
    }

    fn camera_distance(&self) -> f32 {
        self.world_position(CAMERA_NODE)
            .map(|p| p.z)
            .unwrap_or_default()
    }

    fn set_camera_distance(&mut self, distance: f32) {
        self.with_node(CAMERA_NODE, |n| n.transform.position.z = distance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_nodes_are_reported_not_fatal() {
        let mut scene = SceneGraph::new();
        assert!(!scene.set_node_scale(BLADE_NODE, 0.5));
        assert!(!scene.rotate(MODEL_NODE, 0.1, 0.1));
        assert_eq!(scene.node_scale(BLADE_NODE), None);
    }

    #[test]
    fn camera_distance_moves_camera_along_z() {
        let mut scene = SceneGraph::with_saber();
        scene.set_camera_distance(42.0);
        assert_eq!(scene.camera_distance(), 42.0);
        assert_eq!(
            scene.world_position(CAMERA_NODE),
            Some(Vec3::new(0.0, 0.0, 42.0))
        );
    }

    #[test]
    fn rotation_accumulates() {
        let mut scene = SceneGraph::with_saber();
        scene.rotate(MODEL_NODE, 0.5, -0.25);
        scene.rotate(MODEL_NODE, 0.5, -0.25);
        let rotation = scene.node(MODEL_NODE).unwrap().transform.rotation;
        assert_eq!(rotation, Vec3::new(-0.5, 1.0, 0.0));
    }
}
