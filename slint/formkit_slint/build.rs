fn main() {
    slint_build::compile("ui/formkit.slint").expect("failed to compile formkit.slint");
    println!("cargo:rerun-if-changed=ui/formkit.slint");
}
