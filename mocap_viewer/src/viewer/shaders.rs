pub(super) const SCENE_SHADER_SOURCE: &str = r#"
struct SceneUniforms {
    view_projection: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> scene: SceneUniforms;

struct VertexIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
    @location(6) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) normal: vec3<f32>,
    @location(1) color: vec4<f32>,
};

@vertex
fn vs_main(input: VertexIn) -> VertexOutput {
    let model = mat4x4<f32>(input.model_0, input.model_1, input.model_2, input.model_3);
    let world = model * vec4<f32>(input.position, 1.0);
    let world_normal = (model * vec4<f32>(input.normal, 0.0)).xyz;

    var out: VertexOutput;
    out.position = scene.view_projection * world;
    out.normal = world_normal;
    out.color = input.color;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let light_dir = normalize(vec3<f32>(0.4, -0.6, 0.8));
    let normal = normalize(input.normal);
    let diffuse = max(dot(normal, light_dir), 0.0);
    let shade = 0.35 + 0.65 * diffuse;
    return vec4<f32>(input.color.rgb * shade, input.color.a);
}
"#;
