use ecg_image_synth::annotation::AnnotationRecord;
use ecg_image_synth::appearance::AppearanceDecision;
use ecg_image_synth::crop_pairs::{self, CropDirs};
use ecg_image_synth::generate::{self, ErrorPolicy, Generator, OutputOptions};
use ecg_image_synth::recording::{Lead, Recording, STANDARD_LEADS};
use ecg_image_synth::signal_window::{WindowMode, WindowParams, Windower};
use ecg_image_synth::{wfdb_read, wfdb_write, yolo_export, Config};
use std::path::Path;

const CONFIG: &str = r#"
paper_len: 10.0
abs_lead_step: 2.5
resolution: 50
store_configs: 2
appearance:
  calibration_pulse: 0.5
  grid_present: 0.5
"#;

fn synthetic_twelve_lead(name: &str, seconds: f64, rate: f64) -> Recording {
    let n = (seconds * rate) as usize;
    let leads = STANDARD_LEADS
        .iter()
        .enumerate()
        .map(|(i, lead)| {
            let samples = (0..n)
                .map(|k| {
                    let t = k as f64 / rate;
                    // Spiky beat once a second plus a lead-dependent offset
                    let phase = (t % 1.0) - 0.3;
                    1.2 * (-phase * phase / 0.0008).exp() + 0.05 * (i as f64 - 6.0) * 0.1
                })
                .collect();
            Lead::new(*lead, samples)
        })
        .collect();
    Recording::new(name, rate, leads).unwrap()
}

fn write_recording(rec: &Recording, dir: &Path) {
    let signals: Vec<(String, Vec<f64>)> = rec
        .leads()
        .iter()
        .map(|l| (l.name.clone(), l.samples.clone()))
        .collect();
    wfdb_write::write_signals(&signals, rec.sample_rate(), dir, rec.name()).unwrap();
}

#[test]
fn test_batch_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("records");
    std::fs::create_dir(&input).unwrap();
    write_recording(&synthetic_twelve_lead("ecg001", 15.0, 250.0), &input);
    write_recording(&synthetic_twelve_lead("ecg002", 12.5, 250.0), &input);

    let config = Config::from_yaml_str(CONFIG).unwrap();
    let mut generator = Generator::new(&config, Some(11)).unwrap();
    let mut out = OutputOptions::new(root.path().join("images"));
    out.mask_dir = Some(OutputOptions::default_mask_dir(&out.image_dir));

    let records = wfdb_read::find_records(&input).unwrap();
    let summary = generate::run_batch(&mut generator, &records, &out, ErrorPolicy::Abort).unwrap();
    assert_eq!(summary.processed, 2);
    // Rhythm strip of 10s: ecg001 fits starts 0..=5s (3 frames), ecg002 0..=2.5s (2 frames)
    assert_eq!(summary.frames, 5);

    let masks = root.path().join("masks");
    let min_box_px = {
        let g = 8.5 * 50.0 / (8.5 * 0.5 * 25.4 / 5.0);
        2.0 * g - 1.0
    };
    for base in ["ecg001-0", "ecg001-2", "ecg002-1"] {
        let image = image::open(out.image_dir.join(format!("{base}.png"))).unwrap();
        let mask = image::open(masks.join(format!("{base}.png"))).unwrap();
        assert_eq!((image.width(), image.height()), (550, 425));
        assert_eq!((mask.width(), mask.height()), (550, 425));

        let record = AnnotationRecord::read(&out.image_dir.join(format!("{base}.json"))).unwrap();
        assert_eq!((record.width, record.height), (550, 425));
        assert_eq!(record.sampling_frequency, 250.0);
        assert_eq!(record.leads.len(), 13);
        assert!(record.appearance.is_some());
        for lead in &record.leads {
            let bbox = lead.lead_bounding_box.unwrap();
            assert!(bbox.y_min() >= 0 && bbox.y_max() <= 425, "{base} {}", lead.lead_name);
            assert!(bbox.x_min() >= 0 && bbox.x_max() <= 550);
            assert!(bbox.height() as f64 >= min_box_px);
        }
    }

    let labels = root.path().join("labels");
    let exported = yolo_export::export_dir(&out.image_dir, &labels).unwrap();
    assert_eq!(exported.converted, 5);
    let text = std::fs::read_to_string(labels.join("ecg001-0.txt")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 13);
    assert!(lines[12].starts_with("12 "));
    assert!(lines[0].starts_with("0 "));

    let crops = crop_pairs::crop_dir(&CropDirs {
        image_dir: out.image_dir.clone(),
        mask_dir: masks,
        annotation_dir: out.image_dir.clone(),
        image_output_dir: root.path().join("crops/images"),
        mask_output_dir: root.path().join("crops/masks"),
    })
    .unwrap();
    assert_eq!(crops.pages, 5);
    assert_eq!(crops.crops, 5 * 13);
}

#[test]
fn test_geometry_is_reproducible() {
    let config = Config::from_yaml_str(CONFIG).unwrap();
    let generator = Generator::new(&config, None).unwrap();
    let rec = generator.prepare(synthetic_twelve_lead("rep", 12.0, 500.0));
    let window = WindowParams {
        columns: 4,
        lead_seconds: 2.5,
        step_seconds: 2.5,
        rhythm_seconds: 10.0,
    };
    let frame = Windower::new(&rec, &window, Some("II"), WindowMode::Continuous)
        .unwrap()
        .next()
        .unwrap();
    let appearance = AppearanceDecision::fixed(true, true);
    let render = || {
        generator
            .render_frame(&rec, &frame, appearance, true)
            .unwrap()
            .unwrap()
    };
    let first = render();
    let second = render();
    assert_eq!(
        first.annotation.to_json().unwrap(),
        second.annotation.to_json().unwrap()
    );
    assert_eq!(first.annotation.x_grid, 9.843);
    assert_eq!(first.image, second.image);
    assert_eq!(first.mask, second.mask);
}

#[test]
fn test_mask_is_trace_footprint() {
    let config = Config::from_yaml_str(
        "paper_len: 2.5\nabs_lead_step: 2.5\ncolumns: 1\nresolution: 60\nlead_names: false\n",
    )
    .unwrap();
    let generator = Generator::new(&config, None).unwrap();
    let rec = generator.prepare(synthetic_twelve_lead("fp", 30.0, 250.0));
    let window = WindowParams {
        columns: 1,
        lead_seconds: 2.5,
        step_seconds: 2.5,
        rhythm_seconds: 10.0,
    };
    let frame = Windower::new(&rec, &window, Some("II"), WindowMode::Single(0))
        .unwrap()
        .next()
        .unwrap();
    let rendered = generator
        .render_frame(&rec, &frame, AppearanceDecision::fixed(false, false), true)
        .unwrap()
        .unwrap();
    let mask = rendered.mask.unwrap();
    assert_eq!(rendered.image.dimensions(), mask.dimensions());
    assert_eq!(mask.dimensions(), (660, 510));

    // Only the "25mm/s" and "10mm/mV" labels may ink outside the mask: they
    // start at 2s and sit on the 0.5mV baseline
    let params = &config.layout_parameters;
    let y_max = params.height * params.y_grid_size / params.y_grid_inch;
    let x_max = params.width * params.x_grid_size / params.x_grid_inch;
    let baseline = 510.0 * (1.0 - 0.5 / y_max);
    let label_left = 660.0 * 2.0 / x_max;
    let font_px = params.lead_fontsize * 60.0 / 72.0;

    let mut lit = 0;
    for (x, y, px) in mask.enumerate_pixels() {
        let ink = rendered.image.get_pixel(x, y).0 == [0, 0, 0];
        let white = px.0[0] == 255;
        assert!(white || px.0[0] == 0);
        if white {
            assert!(ink, "mask pixel ({x}, {y}) not inked");
            lit += 1;
        } else if ink {
            let (x, y) = (x as f64, y as f64);
            assert!(x >= label_left - 1.0, "({x}, {y})");
            assert!(y >= baseline - 2.0 * font_px && y <= baseline + font_px, "({x}, {y})");
        }
    }
    assert!(lit > 0);
}
